use krishi_core::{ImageHandle, QueryInterpreter};

use super::CommandResult;

/// Shows how a farmer message would be read, without calling any adapters.
pub fn run(text: &str, image: Option<String>) -> CommandResult {
    if text.trim().is_empty() && image.is_none() {
        return CommandResult::failure(
            "interpret",
            "invalid_argument",
            "provide message text or an --image reference",
            2,
        );
    }

    let query = QueryInterpreter::new().interpret(text, image.map(ImageHandle));
    CommandResult::json("interpret", &query)
}
