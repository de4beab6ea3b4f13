//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts, validated with `validator`

pub mod batch;
pub mod campaign;
pub mod event;
pub mod scan;
pub mod scan_result;
