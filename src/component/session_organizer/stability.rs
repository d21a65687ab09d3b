use crate::config::StabilityMode;
use crate::tools::ScanResult;

/// 第二次掃描與第一次比較的結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// 數量一致且不為零，可以移動第二次掃描的結果
    Stable(ScanResult),
    /// 檔案仍在增加或減少
    CountChanged { before: usize, after: usize },
    /// 數量相同但檔案或大小不同（只在 [`StabilityMode::Identity`] 下出現）
    MembershipChanged { total: usize },
    Empty,
}

/// 比較偵測時與等待後的掃描結果
///
/// 預設只比較總數：等待期間若有檔案被另一個檔案替換而總數不變，
/// 仍會視為穩定。需要更嚴格的保證時使用 [`StabilityMode::Identity`]，
/// 它還要求每個檔案的路徑與大小都沒有改變。
#[must_use]
pub fn verify(detected: &ScanResult, rescan: ScanResult, mode: StabilityMode) -> Verification {
    let before = detected.total();
    let after = rescan.total();

    if before != after {
        return Verification::CountChanged { before, after };
    }

    if after == 0 {
        return Verification::Empty;
    }

    if mode == StabilityMode::Identity && detected.fingerprints() != rescan.fingerprints() {
        return Verification::MembershipChanged { total: after };
    }

    Verification::Stable(rescan)
}
