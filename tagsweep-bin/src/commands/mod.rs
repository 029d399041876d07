pub(crate) mod helpers;
pub(crate) mod sweep;

pub(crate) use helpers::create_writer;
pub(crate) use sweep::sweep;

use tagsweep_lib::{HttpDirectory, SweepConfig};

use crate::options::Config;

/// Parameters passed to every command
pub(crate) struct CommandParams {
    pub(crate) directory: HttpDirectory,
    pub(crate) sweep: SweepConfig,
    pub(crate) cfg: Config,
}
