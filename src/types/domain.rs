//! The global axis-aligned bounding box bodies are partitioned and Morton-encoded against.

use memoffset::offset_of;
use mpi::{
    datatype::{Equivalence, UncommittedUserDatatype, UserDatatype},
    Address,
};

use crate::types::body::PointType;

/// Axis-aligned bounding box: `origin` is the minimum corner, `diameter` the extent along
/// each axis. Every body and every cell key is defined relative to one `Domain`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Domain {
    pub origin: [PointType; 3],
    pub diameter: [PointType; 3],
}

unsafe impl Equivalence for Domain {
    type Out = UserDatatype;
    fn equivalent_datatype() -> Self::Out {
        UserDatatype::structured(
            &[1, 1],
            &[
                offset_of!(Domain, origin) as Address,
                offset_of!(Domain, diameter) as Address,
            ],
            &[
                UncommittedUserDatatype::contiguous(3, &PointType::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(3, &PointType::equivalent_datatype()).as_ref(),
            ],
        )
    }
}

impl Domain {
    /// Center of the domain box.
    pub fn center(&self) -> [PointType; 3] {
        [
            self.origin[0] + 0.5 * self.diameter[0],
            self.origin[1] + 0.5 * self.diameter[1],
            self.origin[2] + 0.5 * self.diameter[2],
        ]
    }

    /// Half of the longest axis, the radius used for MAC and level-0 cell sizing.
    pub fn radius(&self) -> PointType {
        0.5 * self.diameter
            .iter()
            .cloned()
            .fold(PointType::MIN, PointType::max)
    }
}
