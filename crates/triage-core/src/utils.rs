//! 通用工具函数

/// 排队号基数，第一位签到患者为 101
pub const QUEUE_NUMBER_BASE: u64 = 100;

/// 根据签到序号生成排队号
pub fn format_queue_number(sequence: u64) -> String {
    (QUEUE_NUMBER_BASE + sequence).to_string()
}

/// 按字符截断文本
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// 去掉首尾空白，空串视为未填写
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_queue_number() {
        assert_eq!(format_queue_number(1), "101");
        assert_eq!(format_queue_number(57), "157");
        assert_eq!(format_queue_number(1200), "1300");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("headache", 4), "head");
        assert_eq!(truncate_chars("short", 50), "short");
        assert_eq!(truncate_chars("头痛发热三天", 2), "头痛");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("Ana".to_string())), Some("Ana".to_string()));
        assert_eq!(non_blank(Some(" Ana \n".to_string())), Some("Ana".to_string()));
    }
}
