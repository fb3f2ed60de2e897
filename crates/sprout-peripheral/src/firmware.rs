//! 固件版本解析
//!
//! 外设固件常以 `"1.95"` 这样的两段式版本号上报，这里补齐为 semver 再比较。

use crate::error::PeripheralError;
use semver::Version;

/// 解析固件版本，缺失的段按 0 补齐
///
/// # 示例
///
/// ```
/// use sprout_peripheral::firmware::parse_firmware_version;
///
/// let v = parse_firmware_version("1.95").unwrap();
/// assert_eq!((v.major, v.minor, v.patch), (1, 95, 0));
/// ```
pub fn parse_firmware_version(raw: &str) -> Result<Version, PeripheralError> {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    let padded = match trimmed.matches('.').count() {
        0 => format!("{}.0.0", trimmed),
        1 => format!("{}.0", trimmed),
        _ => trimmed.to_string(),
    };
    Version::parse(&padded).map_err(|source| PeripheralError::Firmware {
        version: raw.to_string(),
        source,
    })
}
