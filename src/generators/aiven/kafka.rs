use crate::resources::nais_io_v1_clients::AivenKafka;
use crate::source::AivenSource;
use crate::{Error, Result};

pub const MOUNT_PATH: &str = "/var/run/secrets/nais.io/kafka";

pub(super) fn spec(source: &impl AivenSource) -> Result<Option<AivenKafka>> {
    let Some(kafka) = source.kafka() else {
        return Ok(None);
    };
    if kafka.pool.is_empty() {
        return Err(Error::InvalidConfiguration(
            "spec.kafka.pool: a pool must be given".into(),
        ));
    }
    Ok(Some(AivenKafka {
        pool: kafka.pool.clone(),
        streams: kafka.streams,
    }))
}
