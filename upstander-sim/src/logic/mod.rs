pub mod assets;
pub mod batch;
pub mod pacing;
pub mod policy;
pub mod reports;
pub mod survey;

pub use assets::{AssetError, SimAssets};
pub use batch::{BatchConfig, BatchOutcome, run_batch};
pub use pacing::{PacingProfile, SeededStepClock};
pub use policy::Strategy;
pub use reports::RunReport;
pub use survey::{SurveyParser, SyntheticRespondent, attach_feedback};
