use std::{
    process::{ExitCode, Termination},
    time::Duration,
};

use tracing::debug;

use crate::errors::RenderError;

pub enum MainExit {
    Success(Duration),
    Error(RenderError),
}

impl Termination for MainExit {
    fn report(self) -> ExitCode {
        match self {
            Self::Success(spent) => {
                debug!("Done in {spent:?}");
                ExitCode::SUCCESS
            }
            Self::Error(err) => err.report(),
        }
    }
}

impl MainExit {
    pub fn new(result: Result<(), RenderError>, done: Duration) -> Self {
        result.map_or_else(MainExit::Error, |()| MainExit::Success(done))
    }
}
