use base64::Engine;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use super::types::UploadIntent;

/// 计算上传意图的指纹，用于跨页面重载识别"同一次逻辑上传"
///
/// 参与字段：文件名、大小、最后修改时间、标题、空间、时长、排序后的标签。
/// description 不参与。启发式身份而非密码学身份：
/// 文件未变但元数据被改会产生碰撞，重新选择文件导致 last_modified
/// 变化则会产生假阴性。
pub fn fingerprint(intent: &UploadIntent) -> String {
    let mut tags = intent.tags.clone();
    tags.sort();

    let seed = format!(
        "{}|{}|{}|{}|{}|{}|{}",
        intent.file.name,
        intent.file.size_bytes,
        intent.file.last_modified_ms,
        intent.title,
        intent.space.as_deref().unwrap_or(""),
        intent
            .duration_seconds
            .map(|d| d.to_string())
            .unwrap_or_default(),
        tags.join(","),
    );

    BASE64_URL_SAFE_NO_PAD.encode(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FileMeta;

    fn intent() -> UploadIntent {
        UploadIntent {
            title: "Sprint review".to_string(),
            description: Some("weekly".to_string()),
            space: Some("team-a".to_string()),
            duration_seconds: Some(1800),
            tags: vec!["demo".to_string(), "api".to_string()],
            file: FileMeta {
                name: "review.webm".to_string(),
                content_type: "video/webm".to_string(),
                size_bytes: 120 * 1024 * 1024,
                last_modified_ms: 1_700_000_000_000,
            },
        }
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(fingerprint(&intent()), fingerprint(&intent()));
    }

    #[test]
    fn test_tag_order_does_not_matter() {
        let a = intent();
        let mut b = intent();
        b.tags.reverse();
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_last_modified_changes_fingerprint() {
        let a = intent();
        let mut b = intent();
        b.file.last_modified_ms += 1;
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_title_changes_fingerprint() {
        let a = intent();
        let mut b = intent();
        b.title = "Other".to_string();
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_description_does_not_participate() {
        let a = intent();
        let mut b = intent();
        b.description = None;
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }
}
