//! Graph resolution for Mosaic
//!
//! Turns a [`Catalog`](mosaic_core::Catalog) into a
//! [`CompositionConfiguration`]: every import matched to the exports that
//! satisfy it, open generic parts closed over the arguments importers
//! request, and every problem found along the way collected instead of
//! thrown.
//!
//! Resolution runs in passes:
//! 1. Close open generic parts against requested types (and root demands)
//! 2. Match imports to exports under contract name, type, metadata and
//!    cardinality rules; reject parts with unsatisfiable imports and repeat
//!    until no new rejections occur
//! 3. Reject parts on eager-only cycles
//! 4. Compute required sharing boundaries and reject inconsistent parts
//!
//! Passes 2-4 repeat until stable, so the dependents of a rejected part are
//! reported in the same run.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod boundaries;
mod closure;
pub mod configuration;
mod cycles;
pub mod error;
mod index;

pub use configuration::{ComposedPart, CompositionConfiguration, ResolverOptions};
pub use error::{CompositionError, CompositionFailed, ResolveError};
