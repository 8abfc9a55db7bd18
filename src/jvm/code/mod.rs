//! Module for the APIs for the executable code in JVM.
mod instruction;
mod instruction_list;
mod label;
mod method_body;

pub use instruction::*;
pub use instruction_list::*;
pub use label::*;
pub use method_body::*;
