//! Error handling utilities

use tracing::error;

/// Report a fatal error and exit with its status code
///
/// A `HookError` shows its user message, plus the full source chain when
/// `verbose >= 1`. Any other error prints its message and exits with 1.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    use crate::error::{describe_error_code, HookError};

    error!("Fatal error: {}", error);

    let exit_code = if let Some(hook_err) = error.downcast_ref::<HookError>() {
        eprintln!("{}", hook_err.user_message());

        if verbose >= 1 {
            let code = hook_err.code();
            eprintln!("\nError code E{:04}: {}", code, describe_error_code(code));
            eprintln!("\nContext Chain:\n{}", hook_err.developer_message());
        }

        hook_err.exit_code()
    } else {
        eprintln!("Error: {error}");

        if verbose >= 1 {
            eprintln!("\nError chain:");
            for (i, cause) in error.chain().enumerate() {
                eprintln!("  {}: {}", i, cause);
            }
        }

        1
    };

    std::process::exit(exit_code)
}
