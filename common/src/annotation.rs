//! 注記テキストの正規化
//!
//! 入力欄のプレースホルダ文言は「注記なし」と区別して扱い、
//! サーバーへは決して送らない。

/// 注記が空のときに表示するプレースホルダ
pub const ANNOTATION_PLACEHOLDER: &str = "Enter an annotation here";

/// 入力テキストを送信用に正規化
///
/// プレースホルダそのもの（前後空白無視）は空文字に置き換える。
pub fn normalize_annotation(text: &str) -> String {
    if text.trim() == ANNOTATION_PLACEHOLDER {
        String::new()
    } else {
        text.to_string()
    }
}

/// 表示用の注記（空ならプレースホルダ）
pub fn display_annotation(annotation: &str) -> &str {
    if annotation.is_empty() {
        ANNOTATION_PLACEHOLDER
    } else {
        annotation
    }
}
