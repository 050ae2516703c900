use loopnest::{
    axes, do_while, for_each, Attr, Axis, Coord, Domain, Dyn, DynAxis, DynRange, End, Fixed,
    Index, LoopError, Range, RowMajor,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::cell::Cell;
use std::collections::HashSet;

/// Random bounds `(base, end, stride)` plus a dimension extent covering them.
fn random_bounds(rng: &mut StdRng) -> (usize, usize, usize, usize) {
    let base = rng.gen_range(0..3);
    let stride = rng.gen_range(1..4);
    let steps = rng.gen_range(0..10);
    let end = base + steps * stride;
    let extent = end + rng.gen_range(0..2);
    (base, end, stride, extent.max(1))
}

fn visit_all<const N: usize, D: Domain<N>>(domain: &D) -> Vec<[usize; N]> {
    let mut seen = Vec::new();
    for_each(domain, |idx| seen.push(idx.0));
    seen
}

fn assert_visits_lattice<const N: usize, D: Domain<N>>(
    domain: &D,
    bounds: &[(usize, usize, usize); N],
) {
    let seen = visit_all(domain);
    let expected: usize = bounds.iter().map(|&(b, e, s)| (e - b) / s).product();
    assert_eq!(seen.len(), expected);
    assert_eq!(domain.len(), expected);

    let unique: HashSet<[usize; N]> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len(), "a coordinate was visited twice");
    for idx in &seen {
        for (d, &(b, e, s)) in bounds.iter().enumerate() {
            assert!(idx[d] >= b && idx[d] < e);
            assert_eq!((idx[d] - b) % s, 0);
        }
    }
}

#[test]
fn test_visit_counts_unroll_and_tile() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let (b0, e0, s0, x0) = random_bounds(&mut rng);
        let (b1, e1, s1, x1) = random_bounds(&mut rng);
        let outer = Axis::new(0, Dyn(b0), Dyn(e0), Dyn(s0), Attr::new().tile::<3>());
        let inner = Axis::new(1, Dyn(b1), Dyn(e1), Dyn(s1), Attr::new().unroll::<2>().tile::<2>());
        let range = Range::new([x0, x1], axes![outer, inner]);
        assert_visits_lattice(&range, &[(b0, e0, s0), (b1, e1, s1)]);
    }
}

#[test]
fn test_visit_counts_descending_swapped_axes() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let (b0, e0, s0, x0) = random_bounds(&mut rng);
        let (b1, e1, s1, x1) = random_bounds(&mut rng);
        let (b2, e2, s2, x2) = random_bounds(&mut rng);
        let a = Axis::new(2, Dyn(b2), Dyn(e2), Dyn(s2), Attr::new().descending().unroll::<3>());
        let b = Axis::new(0, Dyn(b0), Dyn(e0), Dyn(s0), Attr::new());
        let c = Axis::new(1, Dyn(b1), Dyn(e1), Dyn(s1), Attr::new().descending().dyn_tile(4, true));
        let range = Range::new([x0, x1, x2], axes![a, b, c]);
        assert_visits_lattice(&range, &[(b0, e0, s0), (b1, e1, s1), (b2, e2, s2)]);
    }
}

#[test]
fn test_dyn_range_matches_static_range() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..30 {
        let (b0, e0, s0, x0) = random_bounds(&mut rng);
        let (b1, e1, s1, x1) = random_bounds(&mut rng);
        let fixed = Range::new(
            [x0, x1],
            axes![
                Axis::new(1, Dyn(b1), Dyn(e1), Dyn(s1), Attr::new()),
                Axis::new(0, Dyn(b0), Dyn(e0), Dyn(s0), Attr::new().descending()),
            ],
        );
        let dynamic = DynRange::from_axes(
            [x0, x1],
            [
                DynAxis::new(1, e1).base(b1).stride(s1).tile(2),
                DynAxis::new(0, e0).base(b0).stride(s0).descending(),
            ],
        );
        assert_eq!(visit_all(&fixed), visit_all(&dynamic));
    }
}

#[test]
fn test_do_while_stops_after_false() {
    let range = Range::new([4], axes![Axis::full(0)]);
    let mut seen = Vec::new();
    let finished = do_while(&range, |idx| {
        seen.push(idx[0]);
        idx[0] < 2
    });
    assert!(!finished);
    assert_eq!(seen, vec![0, 1, 2]);
}

#[test]
fn test_do_while_stops_inside_unrolled_group() {
    let axis = Axis::new(0, Fixed::<0>, Fixed::<8>, Fixed::<1>, Attr::new().unroll::<4>());
    let range = Range::new([8], axes![axis]);
    let mut seen = Vec::new();
    let finished = do_while(&range, |idx| {
        seen.push(idx[0]);
        idx[0] != 5
    });
    assert!(!finished);
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_full_unroll_static_axis() {
    let axis = Axis::new(0, Fixed::<0>, Fixed::<6>, Fixed::<3>, Attr::new().full_unroll());
    let range = Range::new([6, 2], axes![axis, Axis::full(1)]);
    assert_eq!(
        visit_all(&range),
        vec![[0, 0], [0, 1], [3, 0], [3, 1]]
    );
}

#[test]
fn test_end_relative_bounds() {
    // Every other row starting from 1, up to the dimension extent.
    let rows = Axis::new(0, Fixed::<1>, End, Fixed::<2>, Attr::new());
    let range = Range::new([7, 1], axes![rows, Axis::full(1)]);
    let coords: Vec<usize> = visit_all(&range).into_iter().map(|c| c[0]).collect();
    assert_eq!(coords, vec![1, 3, 5]);
}

#[test]
fn test_invalid_bounds_are_reported() {
    let zero = Axis::new(0, Fixed::<0>, End, Dyn(0), Attr::new());
    assert_eq!(
        Range::try_new([4], axes![zero]).unwrap_err(),
        LoopError::ZeroStride { axis: 0 }
    );

    let ragged = Axis::new(0, Fixed::<0>, End, Dyn(3), Attr::new());
    assert!(matches!(
        Range::try_new([4], axes![ragged]).unwrap_err(),
        LoopError::StrideMismatch { .. }
    ));

    let exact = Axis::new(0, Fixed::<0>, End, Fixed::<1>, Attr::new().tile_exact::<3>());
    assert_eq!(
        Range::try_new([7], axes![exact]).unwrap_err(),
        LoopError::RemainderRequired {
            axis: 0,
            steps: 7,
            chunk: 3
        }
    );
    assert!(Range::try_new([6], axes![exact]).is_ok());
}

#[test]
fn test_over_storage_order_visits_every_index() {
    let range = DynRange::over::<RowMajor>([3, 2, 2]);
    let seen = visit_all(&range);
    assert_eq!(seen.len(), 12);
    assert_eq!(seen.first(), Some(&[0, 0, 0]));
    assert_eq!(seen[1], [0, 0, 1]);
    assert!(seen.iter().all(|c| Index(*c).within(&[3, 2, 2])));
}

/// A run-time coordinate that counts its evaluations.
#[derive(Clone, Copy)]
struct Counted<'a> {
    evals: &'a Cell<usize>,
    value: usize,
}

impl Coord for Counted<'_> {
    const STATIC: Option<usize> = None;

    fn eval(&self, _extent: usize) -> usize {
        self.evals.set(self.evals.get() + 1);
        self.value
    }
}

#[test]
fn test_bounds_are_resolved_once_per_range() {
    let evals = Cell::new(0);
    let base = Counted {
        evals: &evals,
        value: 0,
    };
    let inner = Axis::new(1, base, End, Fixed::<1>, Attr::new().unroll::<4>());
    let range = Range::new([100, 100], axes![Axis::full(0), inner]);
    assert_eq!(evals.get(), 1);
    assert_eq!(range.plans().len(), 2);
    assert_eq!(range.plans()[1].steps(), 100);

    let mut visits = 0;
    for_each(&range, |_| visits += 1);
    assert_eq!(visits, 10_000);
    assert_eq!(evals.get(), 1, "bounds were evaluated inside the loop");

    for_each(&range, |_| visits += 1);
    assert_eq!(evals.get(), 1);
}

#[test]
fn test_dyn_axis_unroll_visits_every_step() {
    for (end, unroll) in [(7, 2), (8, 4), (5, 8), (0, 3)] {
        let range = DynRange::from_axes([end.max(1), 3], [
            DynAxis::new(0, end).unroll(unroll),
            DynAxis::new(1, 3).unroll(unroll).tile(2),
        ]);
        assert_visits_lattice(&range, &[(0, end, 1), (0, 3, 1)]);
    }

    let range = DynRange::from_axes([8], [DynAxis::new(0, 8).unroll(4).exact()]);
    let mut seen = Vec::new();
    let finished = do_while(&range, |idx| {
        seen.push(idx[0]);
        idx[0] != 5
    });
    assert!(!finished);
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_zero_unroll_or_tile_is_rejected() {
    assert_eq!(
        DynRange::try_from_axes([4], [DynAxis::new(0, 4).unroll(0)]).unwrap_err(),
        LoopError::ZeroFactor { axis: 0 }
    );
    assert_eq!(
        DynRange::try_from_axes([4], [DynAxis::new(0, 4).tile(0)]).unwrap_err(),
        LoopError::ZeroFactor { axis: 0 }
    );
    let zero_tile = Axis::new(0, Fixed::<0>, End, Fixed::<1>, Attr::new().dyn_tile(0, true));
    assert_eq!(
        Range::try_new([4], axes![zero_tile]).unwrap_err(),
        LoopError::ZeroFactor { axis: 0 }
    );

    assert_eq!(
        DynRange::try_from_axes([6], [DynAxis::new(0, 6).unroll(4).exact()]).unwrap_err(),
        LoopError::RemainderRequired {
            axis: 0,
            steps: 6,
            chunk: 4
        }
    );
}
