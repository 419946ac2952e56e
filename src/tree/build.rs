//! Component C: build the local octree bottom-up from a rank's bodies.
//!
//! Grounded in `buildtree.h`'s `CountBodies`/`moveBodies`/`buildNodes`: at each node, a
//! count pass tallies how many bodies fall in each octant, an exclusive prefix sum over
//! those counts gives each octant's run a fixed starting offset, and a permute pass
//! scatters bodies into a freshly allocated buffer by that offset — out-of-place,
//! top-down, until a node holds `ncrit` or fewer bodies. The resulting node tree is then
//! linearized into a single contiguous `Vec<Cell>` in pre-order, with bodies reordered
//! alongside it so every cell's body range is contiguous.

use crate::config::Config;
use crate::error::{FmmError, FmmResult};
use crate::types::body::{Bodies, Body, PointType};
use crate::types::cell::Cell;
use crate::types::domain::Domain;
use crate::types::morton::{MortonKey, DEEPEST_LEVEL};

/// The per-rank local tree: a cell array plus the bodies reordered to match it.
pub struct FmmTree {
    pub cells: Vec<Cell>,
    pub bodies: Bodies,
    pub maxlevel: u64,
}

enum NodeBuild {
    Leaf(Bodies),
    Internal([Option<Box<NodeBuild>>; 8]),
}

fn octant_of(point: &[PointType; 3], center: &[PointType; 3]) -> usize {
    let mut octant = 0usize;
    for d in 0..3 {
        if point[d] > center[d] {
            octant |= 1 << d;
        }
    }
    octant
}

fn child_center(center: &[PointType; 3], radius: PointType, octant: usize) -> [PointType; 3] {
    let mut c = *center;
    let half = radius * 0.5;
    for d in 0..3 {
        c[d] += if (octant >> d) & 1 == 1 { half } else { -half };
    }
    c
}

fn key_at_level(point: &[PointType; 3], domain: &Domain, level: u64) -> MortonKey {
    let mut key = MortonKey::from_point(point, domain);
    for _ in 0..(DEEPEST_LEVEL - level) {
        key = key.parent();
    }
    key
}

fn build_node(
    bodies: Bodies,
    center: [PointType; 3],
    radius: PointType,
    level: u64,
    ncrit: usize,
    nspawn: usize,
) -> NodeBuild {
    if bodies.len() <= ncrit || level >= DEEPEST_LEVEL {
        return NodeBuild::Leaf(bodies);
    }

    let total = bodies.len();

    // Count phase: tally each body's octant before touching its storage slot.
    let mut counts = [0usize; 8];
    for body in &bodies {
        counts[octant_of(&body.x, &center)] += 1;
    }

    // Exclusive prefix sum: offsets[octant] is where that octant's run starts once
    // permuted.
    let mut offsets = [0usize; 8];
    for octant in 1..8 {
        offsets[octant] = offsets[octant - 1] + counts[octant - 1];
    }

    // Permute phase: scatter bodies out-of-place into a fresh buffer, ordered by octant
    // run, `cursors` tracking the next free slot within each run.
    let mut buffer: Vec<Body> = vec![Body::default(); total];
    let mut cursors = offsets;
    for body in bodies {
        let octant = octant_of(&body.x, &center);
        buffer[cursors[octant]] = body;
        cursors[octant] += 1;
    }

    let mut buffer_iter = buffer.into_iter();
    let buckets: [Bodies; 8] = std::array::from_fn(|octant| (&mut buffer_iter).take(counts[octant]).collect());

    let build_child = |octant: usize, bucket: Bodies| -> Option<Box<NodeBuild>> {
        if bucket.is_empty() {
            return None;
        }
        let c = child_center(&center, radius, octant);
        Some(Box::new(build_node(
            bucket,
            c,
            radius * 0.5,
            level + 1,
            ncrit,
            nspawn,
        )))
    };

    let mut children: [Option<Box<NodeBuild>>; 8] = Default::default();

    if total > nspawn {
        let mut iter = buckets.into_iter();
        let lower: Vec<Bodies> = (&mut iter).take(4).collect();
        let upper: Vec<Bodies> = iter.collect();

        let (left, right) = rayon::join(
            || {
                lower
                    .into_iter()
                    .enumerate()
                    .map(|(i, b)| build_child(i, b))
                    .collect::<Vec<_>>()
            },
            || {
                upper
                    .into_iter()
                    .enumerate()
                    .map(|(i, b)| build_child(i + 4, b))
                    .collect::<Vec<_>>()
            },
        );

        for (i, child) in left.into_iter().chain(right.into_iter()).enumerate() {
            children[i] = child;
        }
    } else {
        for (i, bucket) in buckets.into_iter().enumerate() {
            children[i] = build_child(i, bucket);
        }
    }

    NodeBuild::Internal(children)
}

#[allow(clippy::too_many_arguments)]
fn linearize(
    node: NodeBuild,
    x: [PointType; 3],
    r: PointType,
    level: u64,
    parent: Option<usize>,
    my_index: usize,
    cells: &mut Vec<Cell>,
    next_free: &mut usize,
    out_bodies: &mut Bodies,
    domain: &Domain,
    maxlevel: &mut u64,
) {
    let icell = key_at_level(&x, domain, level);

    match node {
        NodeBuild::Leaf(bodies) => {
            let ibody = out_bodies.len();
            let nbody = bodies.len();
            out_bodies.extend(bodies);
            let mut cell = Cell::new_leaf(x, r, icell, ibody, nbody);
            cell.parent = parent;
            cells[my_index] = cell;
            *maxlevel = (*maxlevel).max(level);
        }
        NodeBuild::Internal(children) => {
            let present: Vec<(usize, NodeBuild)> = children
                .into_iter()
                .enumerate()
                .filter_map(|(octant, c)| c.map(|b| (octant, *b)))
                .collect();

            let nchild = present.len();
            let ichild = *next_free;
            *next_free += nchild;
            for _ in 0..nchild {
                cells.push(Cell::new_leaf([0.0; 3], 0.0, MortonKey::from_morton(0), 0, 0));
            }

            let mut child_slot = ichild;
            for (octant, child_node) in present {
                let child_x = child_center(&x, r, octant);
                linearize(
                    child_node,
                    child_x,
                    r * 0.5,
                    level + 1,
                    Some(my_index),
                    child_slot,
                    cells,
                    next_free,
                    out_bodies,
                    domain,
                    maxlevel,
                );
                child_slot += 1;
            }

            let nbody: usize = cells[ichild..ichild + nchild].iter().map(|c| c.nbody).sum();
            let ibody = cells[ichild].ibody;

            cells[my_index] = Cell {
                x,
                r,
                parent,
                ichild,
                nchild: nchild as u8,
                ibody,
                nbody,
                multipole: Vec::new(),
                local: Vec::new(),
                icell,
                weight: 1.0,
            };
        }
    }
}

/// Build the local tree for `bodies`, geometrically rooted at the global `domain` so that
/// every rank's cells carry Morton keys comparable against every other rank's.
///
/// An empty body set produces an empty cell array (no root); a non-positive domain
/// radius is rejected as `FmmError::Degenerate` rather than silently producing a
/// zero-radius root.
pub fn build_tree(bodies: Bodies, domain: &Domain, config: &Config) -> FmmResult<FmmTree> {
    if bodies.is_empty() {
        return Ok(FmmTree {
            cells: Vec::new(),
            bodies: Bodies::new(),
            maxlevel: 0,
        });
    }

    let root_center = domain.center();
    let root_radius = domain.radius();

    if root_radius <= 0.0 {
        return Err(FmmError::Degenerate(
            "domain radius is non-positive".to_string(),
        ));
    }

    let root_key = key_at_level(&root_center, domain, 0);
    let mut cells = vec![Cell::new_leaf(root_center, root_radius, root_key, 0, 0)];
    let mut next_free = 1usize;
    let mut out_bodies = Bodies::with_capacity(bodies.len());
    let mut maxlevel = 0u64;

    let root_node = build_node(bodies, root_center, root_radius, 0, config.ncrit, config.nspawn);
    linearize(
        root_node,
        root_center,
        root_radius,
        0,
        None,
        0,
        &mut cells,
        &mut next_free,
        &mut out_bodies,
        domain,
        &mut maxlevel,
    );

    check_invariants(&cells, out_bodies.len())?;

    Ok(FmmTree {
        cells,
        bodies: out_bodies,
        maxlevel,
    })
}

/// Check the structural invariants from §8: body-count consistency and in-range
/// parent/child indices.
fn check_invariants(cells: &[Cell], total_bodies: usize) -> FmmResult<()> {
    if cells[0].nbody != total_bodies {
        return Err(FmmError::Internal(format!(
            "root NBODY {} does not match total body count {}",
            cells[0].nbody, total_bodies
        )));
    }

    for (index, cell) in cells.iter().enumerate() {
        if cell.nchild > 0 {
            if cell.nchild == 0 {
                return Err(FmmError::Internal(format!(
                    "cell {} is non-leaf with zero children",
                    index
                )));
            }
            let end = cell.ichild + cell.nchild as usize;
            if end > cells.len() {
                return Err(FmmError::Internal(format!(
                    "cell {} has out-of-range child block [{}, {})",
                    index, cell.ichild, end
                )));
            }
            for child in &cells[cell.ichild..end] {
                if child.parent != Some(index) {
                    return Err(FmmError::Internal(format!(
                        "child of cell {} has inconsistent parent pointer",
                        index
                    )));
                }
            }
        } else if cell.nbody == 0 && index != 0 {
            return Err(FmmError::Internal(format!(
                "leaf cell {} is empty",
                index
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::morton::MortonKey as Key;

    fn make_body(x: [f64; 3]) -> Body {
        let mut body = Body::default();
        body.x = x;
        body
    }

    fn unit_domain() -> Domain {
        Domain {
            origin: [-1.0, -1.0, -1.0],
            diameter: [2.0, 2.0, 2.0],
        }
    }

    #[test]
    fn test_single_leaf_when_under_ncrit() {
        let domain = unit_domain();
        let config = Config {
            ncrit: 32,
            ..Config::default()
        };
        let bodies = vec![make_body([0.1, 0.1, 0.1]), make_body([-0.1, -0.1, -0.1])];
        let tree = build_tree(bodies, &domain, &config).unwrap();
        assert_eq!(tree.cells.len(), 1);
        assert_eq!(tree.cells[0].nbody, 2);
        assert!(tree.cells[0].is_leaf());
    }

    #[test]
    fn test_splits_when_over_ncrit() {
        let domain = unit_domain();
        let config = Config {
            ncrit: 1,
            nspawn: 1000,
            ..Config::default()
        };
        let bodies: Vec<Body> = (0..8)
            .map(|i| {
                let s = |bit: i32| if bit == 1 { 0.5 } else { -0.5 };
                make_body([
                    s((i >> 0) & 1),
                    s((i >> 1) & 1),
                    s((i >> 2) & 1),
                ])
            })
            .collect();
        let tree = build_tree(bodies, &domain, &config).unwrap();
        assert_eq!(tree.cells[0].nchild, 8);
        assert_eq!(tree.bodies.len(), 8);
        for cell in tree.cells.iter().filter(|c| c.is_leaf()) {
            assert_eq!(cell.nbody, 1);
        }
    }

    #[test]
    fn test_body_ranges_are_contiguous_and_cover_all_bodies() {
        let domain = unit_domain();
        let config = Config {
            ncrit: 1,
            nspawn: 1000,
            ..Config::default()
        };
        let bodies: Vec<Body> = (0..16)
            .map(|i| make_body([0.9 * (i as f64 / 16.0) - 0.45, 0.0, 0.0]))
            .collect();
        let tree = build_tree(bodies, &domain, &config).unwrap();
        let mut covered = vec![false; tree.bodies.len()];
        for cell in tree.cells.iter().filter(|c| c.is_leaf()) {
            for i in cell.ibody..cell.ibody + cell.nbody {
                assert!(!covered[i], "body {} covered by more than one leaf", i);
                covered[i] = true;
            }
        }
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    fn test_cell_morton_key_is_ancestor_of_body_key() {
        let domain = unit_domain();
        let config = Config {
            ncrit: 1,
            nspawn: 1000,
            ..Config::default()
        };
        let body = make_body([0.3, 0.3, 0.3]);
        let body_key = Key::from_point(&body.x, &domain);
        let tree = build_tree(vec![body], &domain, &config).unwrap();
        let leaf = &tree.cells[0];
        assert!(leaf.icell.is_ancestor(&body_key) || leaf.icell.morton() == body_key.morton());
    }
}
