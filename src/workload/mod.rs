//! Converts MapReduce application names to actual application code.
//!
//! # Example
//!
//! To get the weather summary application:
//! ```
//! # use anyhow::Result;
//! use mrflow::workload;
//! # fn main() -> Result<()> {
//! let weather = workload::named("weather")?;
//! # Ok(())
//! # }
//! ```

use crate::Workload;
use anyhow::{bail, Result};

pub mod wc;
pub mod weather;

/// Gets the [`Workload`] named `name`.
///
/// Returns [`None`] if no application with the given name was found.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "weather" => Some(Workload {
            map_fn: weather::map,
            reduce_fn: weather::reduce,
            final_reduce_fn: weather::final_reduce,
        }),
        "wc" => Some(Workload {
            map_fn: wc::map,
            reduce_fn: wc::reduce,
            final_reduce_fn: wc::final_reduce,
        }),
        _ => None,
    }
}

/// Gets the [`Workload`] named `name`.
///
/// Returns an [`anyhow::Error`] if no application with the given name was found.
pub fn named(name: &str) -> Result<Workload> {
    match try_named(name) {
        Some(app) => Ok(app),
        None => bail!("No app named `{}` found.", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_resolve() {
        assert!(try_named("weather").is_some());
        assert!(try_named("wc").is_some());
        assert!(named("grep").is_err());
    }
}
