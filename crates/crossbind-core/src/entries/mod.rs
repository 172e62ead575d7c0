//! Registry entries describing managed types and their members.

mod callable;
mod field;
mod type_entry;

pub use callable::{CallableCandidate, MemberKind, Param, ParamFlags};
pub use field::FieldEntry;
pub use type_entry::{TypeEntry, TypeKind};
