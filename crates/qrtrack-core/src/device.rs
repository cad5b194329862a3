//! User-agent classification for scan analytics.
//!
//! Pure substring matching over the raw `User-Agent` header. Intentionally
//! coarse — these fields feed dashboards and fraud heuristics, not feature
//! gating, so an unrecognized agent simply falls through to the defaults.

use crate::types::DeviceType;

/// Everything we derive from one `User-Agent` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_type: DeviceType,
    pub browser: String,
    pub platform: String,
}

/// Fallback label when a browser or platform cannot be identified.
pub const UNKNOWN: &str = "Unknown";

/// Classifies a user agent. `None` or empty input yields desktop/Unknown,
/// which the fraud scorer separately penalizes.
pub fn classify(user_agent: Option<&str>) -> DeviceInfo {
    let ua = user_agent.unwrap_or("");
    DeviceInfo {
        device_type: device_type(ua),
        browser: browser(ua).to_owned(),
        platform: platform(ua).to_owned(),
    }
}

/// Order matters: iPads send "Mobile" in their UA, so tablet markers are
/// checked first.
fn device_type(ua: &str) -> DeviceType {
    if ua.contains("iPad") || ua.contains("Tablet") {
        DeviceType::Tablet
    } else if ua.contains("Mobile")
        || ua.contains("Android")
        || ua.contains("iPhone")
        || ua.contains("iPod")
    {
        DeviceType::Mobile
    } else {
        DeviceType::Desktop
    }
}

/// Edge advertises "Edg/" alongside "Chrome/", and every WebKit browser
/// carries "Safari", so the checks run from most to least specific.
fn browser(ua: &str) -> &'static str {
    if ua.contains("Edg/") || ua.contains("Edge") {
        "Edge"
    } else if ua.contains("OPR/") || ua.contains("Opera") {
        "Opera"
    } else if ua.contains("Chrome") {
        "Chrome"
    } else if ua.contains("Firefox") {
        "Firefox"
    } else if ua.contains("Safari") {
        "Safari"
    } else {
        UNKNOWN
    }
}

/// "Android" before "Linux": Android UAs include "Linux".
fn platform(ua: &str) -> &'static str {
    if ua.contains("Android") {
        "Android"
    } else if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
        "iOS"
    } else if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("Mac OS X") || ua.contains("Macintosh") {
        "macOS"
    } else if ua.contains("Linux") {
        "Linux"
    } else {
        UNKNOWN
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) \
         AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
    const IPAD_SAFARI: &str = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) \
         AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
    const ANDROID_CHROME: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) \
         AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36";
    const WINDOWS_EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
         AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0";
    const MAC_FIREFOX: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:125.0) Gecko/20100101 Firefox/125.0";
    const LINUX_CHROME: &str = "Mozilla/5.0 (X11; Linux x86_64) \
         AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

    #[test]
    fn test_iphone_classifies_mobile_safari_ios() {
        let info = classify(Some(IPHONE_SAFARI));
        assert_eq!(info.device_type, DeviceType::Mobile);
        assert_eq!(info.browser, "Safari");
        assert_eq!(info.platform, "iOS");
    }

    #[test]
    fn test_ipad_is_tablet_despite_mobile_marker() {
        let info = classify(Some(IPAD_SAFARI));
        assert_eq!(info.device_type, DeviceType::Tablet);
        assert_eq!(info.platform, "iOS");
    }

    #[test]
    fn test_android_chrome() {
        let info = classify(Some(ANDROID_CHROME));
        assert_eq!(info.device_type, DeviceType::Mobile);
        assert_eq!(info.browser, "Chrome");
        // Android UA contains "Linux" but must classify as Android.
        assert_eq!(info.platform, "Android");
    }

    #[test]
    fn test_edge_wins_over_chrome_marker() {
        let info = classify(Some(WINDOWS_EDGE));
        assert_eq!(info.device_type, DeviceType::Desktop);
        assert_eq!(info.browser, "Edge");
        assert_eq!(info.platform, "Windows");
    }

    #[test]
    fn test_desktop_firefox_and_chrome() {
        let ff = classify(Some(MAC_FIREFOX));
        assert_eq!(ff.browser, "Firefox");
        assert_eq!(ff.platform, "macOS");

        let ch = classify(Some(LINUX_CHROME));
        assert_eq!(ch.browser, "Chrome");
        assert_eq!(ch.platform, "Linux");
    }

    #[test]
    fn test_missing_or_garbage_agent_defaults() {
        for ua in [None, Some(""), Some("curl/8.5.0"), Some("weird bot 42")] {
            let info = classify(ua);
            assert_eq!(info.device_type, DeviceType::Desktop);
            assert_eq!(info.browser, UNKNOWN);
            assert_eq!(info.platform, UNKNOWN);
        }
    }
}
