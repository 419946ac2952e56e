//! Data structures and methods for point bodies carrying source strength and target
//! accumulators through one FMM iteration.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use memoffset::offset_of;
use mpi::{
    datatype::{Equivalence, UncommittedUserDatatype, UserDatatype},
    topology::Rank,
    Address,
};
use serde::{Deserialize, Serialize};

use crate::types::morton::{KeyType, MortonKey};

pub type PointType = f64;

/// A point body: position, source strength, and the 4-wide target accumulator
/// (potential, then the 3 force components). `ibody` is the body's position in the
/// rank-local ingest order so results can be scattered back to the host in that order
/// after migration; `iproc` is the rank that currently owns it; `icell` is the Morton
/// key of the leaf cell it falls into once a tree has been built over it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Body {
    pub x: [PointType; 3],
    pub src: PointType,
    pub trg: [PointType; 4],
    pub ibody: usize,
    pub iproc: Rank,
    pub icell: MortonKey,
}

pub type Bodies = Vec<Body>;

impl Default for Body {
    fn default() -> Self {
        Body {
            x: [0.0; 3],
            src: 0.0,
            trg: [0.0; 4],
            ibody: 0,
            iproc: 0,
            icell: MortonKey::default(),
        }
    }
}

unsafe impl Equivalence for Body {
    type Out = UserDatatype;
    fn equivalent_datatype() -> Self::Out {
        UserDatatype::structured(
            &[1, 1, 1, 1, 1, 1],
            &[
                offset_of!(Body, x) as Address,
                offset_of!(Body, src) as Address,
                offset_of!(Body, trg) as Address,
                offset_of!(Body, ibody) as Address,
                offset_of!(Body, iproc) as Address,
                offset_of!(Body, icell) as Address,
            ],
            &[
                UncommittedUserDatatype::contiguous(3, &PointType::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(1, &PointType::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(4, &PointType::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(1, &usize::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(1, &Rank::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::structured(
                    &[1, 1],
                    &[
                        offset_of!(MortonKey, anchor) as Address,
                        offset_of!(MortonKey, morton) as Address,
                    ],
                    &[
                        UncommittedUserDatatype::contiguous(3, &KeyType::equivalent_datatype())
                            .as_ref(),
                        UncommittedUserDatatype::contiguous(1, &KeyType::equivalent_datatype())
                            .as_ref(),
                    ],
                )
                .as_ref(),
            ],
        )
    }
}

impl PartialEq for Body {
    fn eq(&self, other: &Self) -> bool {
        self.icell == other.icell && self.ibody == other.ibody
    }
}

impl Eq for Body {}

impl Ord for Body {
    fn cmp(&self, other: &Self) -> Ordering {
        self.icell.cmp(&other.icell)
    }
}

impl PartialOrd for Body {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Body {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.icell.hash(state);
        self.ibody.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::domain::Domain;

    fn domain_fixture() -> Domain {
        Domain {
            origin: [0., 0., 0.],
            diameter: [1., 1., 1.],
        }
    }

    #[test]
    fn test_ordering_follows_morton_key() {
        let domain = domain_fixture();
        let mut a = Body::default();
        a.x = [0.1, 0.1, 0.1];
        a.icell = MortonKey::from_point(&a.x, &domain);

        let mut b = Body::default();
        b.x = [0.9, 0.9, 0.9];
        b.icell = MortonKey::from_point(&b.x, &domain);

        assert!(a < b);
    }

    #[test]
    fn test_default_body_has_zero_target() {
        let body = Body::default();
        assert_eq!(body.trg, [0.0; 4]);
    }
}
