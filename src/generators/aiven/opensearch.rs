use crate::resources::nais_io_v1_clients::AivenOpenSearch;
use crate::source::AivenSource;
use crate::{Error, Result};

const ACCESS_LEVELS: [&str; 4] = ["read", "write", "readwrite", "admin"];

pub(super) fn spec(source: &impl AivenSource) -> Result<Option<AivenOpenSearch>> {
    let Some(open_search) = source.open_search() else {
        return Ok(None);
    };
    let access = open_search.access.as_deref().unwrap_or("read");
    if !ACCESS_LEVELS.contains(&access) {
        return Err(Error::InvalidConfiguration(format!(
            "spec.openSearch.access: {access:?} is not one of {}",
            ACCESS_LEVELS.join(", ")
        )));
    }
    Ok(Some(AivenOpenSearch {
        // instances are prefixed with the team in Aiven
        instance: format!("opensearch-{}-{}", source.namespace(), open_search.instance),
        access: access.to_owned(),
    }))
}
