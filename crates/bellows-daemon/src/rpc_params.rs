//! RPC parameter extraction macros.
//!
//! Handlers return early with an error `Response` when a parameter is
//! missing or has the wrong shape.

/// Extract a required string parameter from a request.
///
/// Returns the parameter value as `&str`, or returns early with an error
/// Response if the parameter is missing or not a string.
#[macro_export]
macro_rules! require_str_param {
    ($req:expr, $name:literal) => {
        match $req.params.get($name).and_then(|v| v.as_str()) {
            Some(v) => v,
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

/// Extract a required array-of-strings parameter from a request.
///
/// Returns `Vec<String>`, or returns early with an error Response if the
/// parameter is missing, not an array, or contains non-string entries.
#[macro_export]
macro_rules! require_str_array_param {
    ($req:expr, $name:literal) => {{
        let values = match $req.params.get($name).and_then(|v| v.as_array()) {
            Some(v) => v,
            None => {
                return $crate::protocol::Response::error(
                    $req.id.clone(),
                    $crate::protocol::INVALID_PARAMS,
                    concat!("Missing or invalid '", $name, "' parameter"),
                )
            }
        };
        let mut out: Vec<String> = Vec::with_capacity(values.len());
        for value in values {
            match value.as_str() {
                Some(s) => out.push(s.to_string()),
                None => {
                    return $crate::protocol::Response::error(
                        $req.id.clone(),
                        $crate::protocol::INVALID_PARAMS,
                        concat!("Entries of '", $name, "' must be strings"),
                    )
                }
            }
        }
        out
    }};
}
