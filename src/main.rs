use std::process::exit;
use std::sync::Arc;

use srx_validatord::collaborators::RpkiValidator;
use srx_validatord::error::{ExitError, Failed};
use srx_validatord::ids::AsNumber;
use srx_validatord::log::Logger;
use srx_validatord::outcome::ValidationOutcome;
use srx_validatord::prefix::Prefix;
use srx_validatord::server::Collaborators;
use srx_validatord::{operation, Config, Operation};

/// A ROA validator that always answers `Unknown`, standing in for the
/// real RPKI validation engine this crate treats as an external
/// collaborator. A production deployment supplies its own
/// [`RpkiValidator`]; see [`srx_validatord::collaborators`].
struct UnconfiguredRpki;

impl RpkiValidator for UnconfiguredRpki {
    fn validate(&self, _prefix: &Prefix, _origin: AsNumber) -> Result<ValidationOutcome, Failed> {
        Ok(ValidationOutcome::Unknown)
    }
}

struct UnconfiguredBgpsec;

impl srx_validatord::collaborators::BgpsecValidator for UnconfiguredBgpsec {
    fn validate_signature(
        &self,
        _update: &srx_validatord::update_cache::UpdateData,
    ) -> Result<ValidationOutcome, Failed> {
        Ok(ValidationOutcome::Unknown)
    }
}

fn _main() -> Result<(), ExitError> {
    Logger::init().map_err(|_| ExitError::Initialization)?;
    let matches = operation::app().get_matches();
    let config = Config::from_arg_matches(&matches);
    let operation = Operation::from_arg_matches(&matches);
    let collaborators = Collaborators {
        rpki: Arc::new(UnconfiguredRpki),
        bgpsec: Arc::new(UnconfiguredBgpsec),
    };
    operation.run(config, collaborators)
}

fn main() {
    match _main() {
        Ok(()) => exit(0),
        Err(ExitError::Generic) => exit(1),
        Err(ExitError::Initialization) => exit(2),
    }
}
