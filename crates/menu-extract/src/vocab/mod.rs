//! Read-only lookup tables shared across pipeline stages (`spec.md` §9
//! "Cross-module shared globals"). Initialised once via `std::sync::LazyLock`,
//! never mutated at runtime.

pub mod category;
pub mod combo;
pub mod size;
