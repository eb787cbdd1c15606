//! 通用工具函数

use chrono::{NaiveDate, Utc};

/// 诊所"今天"的日期，统一以 UTC 计算
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// 规范化邮箱：去掉首尾空白并转为小写
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 验证邮箱格式
pub fn is_valid_email(email: &str) -> bool {
    // 只做结构性检查：一个 @，两侧非空，域名中包含点
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}

/// 空字符串视为未填写
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("pasien@klinik.id"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("a@b@c.id"));
        assert!(!is_valid_email("a@localhost"));
        assert!(!is_valid_email("a b@klinik.id"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Dokter@Klinik.ID "), "dokter@klinik.id");
    }

    #[test]
    fn test_blank_to_none() {
        assert_eq!(blank_to_none(Some("   ".to_string())), None);
        assert_eq!(blank_to_none(Some(" 0812 ".to_string())), Some("0812".to_string()));
        assert_eq!(blank_to_none(None), None);
    }
}
