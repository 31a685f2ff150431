//! RPC parameter extraction macros
//!
//! Handlers return early with an `INVALID_PARAMS` response when a required
//! parameter is missing or has the wrong type.

/// Extract a required absolute path parameter from a request.
///
/// Evaluates to a normalized `PathBuf`, or returns early with an error
/// Response if the parameter is missing, not a string, or relative.
///
/// # Example
///
/// ```ignore
/// let path = require_path_param!(req, "path");
/// ```
#[macro_export]
macro_rules! require_path_param {
    ($req:expr, $name:literal) => {
        match $req.params.get($name).and_then(|v| v.as_str()) {
            Some(v) if ::std::path::Path::new(v).is_absolute() => {
                ::emblem_core::paths::normalize(::std::path::Path::new(v))
            }
            Some(_) => {
                return $crate::protocol::Response::error(
                    $req.id.clone(),
                    $crate::protocol::INVALID_PARAMS,
                    concat!("'", $name, "' must be an absolute path"),
                )
            }
            None => {
                return $crate::protocol::Response::error(
                    $req.id.clone(),
                    $crate::protocol::INVALID_PARAMS,
                    concat!("Missing or invalid '", $name, "' parameter"),
                )
            }
        }
    };
}

/// Extract an optional bool parameter from a request.
///
/// Returns `Option<bool>`. Returns `None` if the parameter is missing or not a bool.
///
/// # Example
///
/// ```ignore
/// let recurse = optional_bool_param!(req, "recurse").unwrap_or(false);
/// ```
#[macro_export]
macro_rules! optional_bool_param {
    ($req:expr, $name:literal) => {
        $req.params.get($name).and_then(|v| v.as_bool())
    };
}
