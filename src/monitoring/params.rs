use pg_grab_shared::{Oid, ParamList, PARAM_DELIMITER};

use crate::error::{GrabError, Result};
use crate::types::TypeRegistry;

/// Bound parameters rendered through their declared types' output functions,
/// in positional order.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedParams {
    items: Vec<(Oid, Option<String>)>,
}

impl RenderedParams {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Parallel sequences of rendered values (None for SQL NULL) and types.
    pub fn to_arrays(&self) -> (Vec<Option<String>>, Vec<Oid>) {
        self.items
            .iter()
            .map(|(oid, value)| (value.clone(), *oid))
            .unzip()
    }

    /// Single text joined with the parameter delimiter; NULL renders empty.
    pub fn to_delimited(&self) -> String {
        self.items
            .iter()
            .map(|(_, value)| value.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(PARAM_DELIMITER)
    }
}

/// Renders every bound parameter. `None` when the statement has no
/// parameters, so the log stores NULL rather than an empty sequence.
///
/// The output function is resolved for every position, NULL ones included,
/// so an unknown type fails even when its value is NULL.
pub fn render_params(params: Option<&ParamList>, types: &TypeRegistry) -> Result<Option<RenderedParams>> {
    let params = match params {
        Some(params) if !params.is_empty() => params,
        _ => return Ok(None),
    };

    let mut items = Vec::with_capacity(params.len());
    for param in params {
        let output = types
            .output_function(param.ptype)
            .ok_or(GrabError::NoOutputFunction(param.ptype))?;

        let rendered = match &param.value {
            Some(value) => Some(output(value, types)?),
            None => None,
        };
        items.push((param.ptype, rendered));
    }

    Ok(Some(RenderedParams { items }))
}
