// Lucky Draw Engine
// Prize draws for a live event: prize tiers, a roster, and an append-only
// winner log kept per user.

// Core modules
pub mod error;
pub mod state;
pub mod validation;
pub mod utils;

// Draw modules
pub mod selection;
pub mod engine;
pub mod instruction;
pub mod processor;

// Persistence and configuration
pub mod store;
pub mod config;

pub use error::DrawError;
pub use processor::{Processor, Response};
pub use store::UserKey;

/// Single entrypoint for transports: decode `instruction_data` and run it
/// for `caller` against the processor's store.
pub async fn process_instruction(
    processor: &Processor,
    caller: Option<&UserKey>,
    instruction_data: &[u8],
) -> Result<Response, DrawError> {
    processor.process(caller, instruction_data).await
}
