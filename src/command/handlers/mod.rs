//! Operator command handlers
//!
//! Every handler takes the application context and the raw argument text
//! and returns the response text on success.

mod device;
mod identity;
mod power;
mod sweep;
mod wavelength;

pub use device::{handle_get_pos, handle_get_temp, handle_reset, handle_set_pos};
pub use identity::handle_iden;
pub use power::{handle_get_power, handle_powerup};
pub use sweep::{handle_stop, handle_sweep, handle_sweep_status};
pub use wavelength::{handle_get_interval, handle_get_wl, handle_set_wl};

use crate::channel::Channel;
use crate::context::AppContext;
use std::str::FromStr;
use std::sync::Arc;
use tf1_shared::FilterError;

/// Result of a handler: response text, possibly empty
pub type HandlerResult = Result<String, FilterError>;

/// Split `band:field:field...` into exactly `N` trimmed fields
fn fields<'a, const N: usize>(args: &'a str, usage: &str) -> Result<[&'a str; N], FilterError> {
    let fields: Vec<&str> = args.split(':').map(str::trim).collect();
    <[&str; N]>::try_from(fields)
        .map_err(|_| FilterError::argument(format!("expected {usage}, got '{args}'")))
}

fn parse<T: FromStr>(field: &str, what: &str) -> Result<T, FilterError> {
    field
        .parse()
        .map_err(|_| FilterError::argument(format!("invalid {what} '{field}'")))
}

/// Resolve a band-only argument such as `C`, `C?` or `?C`
fn band<'a>(ctx: &'a AppContext, args: &str) -> Result<&'a Arc<Channel>, FilterError> {
    let band = args.trim_matches(|c: char| c == '?' || c == ':' || c.is_ascii_whitespace());
    ctx.channels.select(band)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::simulated_context;

    #[test]
    fn test_fields() {
        assert_eq!(fields::<2>("C: 1550.5", "band:wl").unwrap(), ["C", "1550.5"]);
        assert!(fields::<2>("C", "band:wl").is_err());
        assert!(fields::<2>("C:1:2", "band:wl").is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse::<f32>("1550.5", "wavelength").unwrap(), 1550.5);
        assert!(matches!(
            parse::<f32>("abc", "wavelength"),
            Err(FilterError::Argument(_))
        ));
        assert!(parse::<u64>("-5", "interval").is_err());
    }

    #[test]
    fn test_band_argument_forms() {
        let (ctx, _) = simulated_context();
        for args in ["C", "c", "C?", "?c", " C "] {
            assert_eq!(band(&ctx, args).unwrap().name(), 'C');
        }
        assert!(band(&ctx, "").is_err());
        assert!(band(&ctx, "Q").is_err());
    }
}
