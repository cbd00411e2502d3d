//! Prompts and fixed strings exchanged with the vision model and the reader.
//!
//! Everything user-visible in the enhanced document lives here: the describe
//! prompt, the failure sentinel, and the annotation label. Downstream
//! consumers match on the sentinel and label, so they are constants rather
//! than configuration.
//!
//! Callers can override the prompt via
//! [`crate::config::EnhanceConfig::system_prompt`].

/// Default prompt sent with every image.
///
/// Tuned for computer-science and mathematics exam material (the 11408
/// syllabus): describe structure and relations, stay concise, no filler.
pub const DEFAULT_DESCRIBE_PROMPT: &str = "你是计算机考研助教。请针对“11408计算机/数学考研”优化图片描述，用于RAG检索。\
如果是数学图：描述函数走势、几何关系。\
如果是数据结构/算法图：描述结构特征、节点关系、操作步骤。\
如果是计组/OS/网络图：描述组件名称、数据流向、协议层级。\
保持简练，不要废话。";

/// Description recorded when every attempt for an image failed.
pub const DESCRIPTION_FAILED_SENTINEL: &str = "图片描述生成失败 (Max retries exceeded)";

/// Label that opens every injected annotation block.
pub const ANNOTATION_LABEL: &str = "**[AI图解]**";

/// Format the annotation block appended after an image reference.
pub fn annotation_block(description: &str) -> String {
    format!("\n\n> {} {}\n\n", ANNOTATION_LABEL, description)
}

/// Progress message shown while images are being described.
pub fn describe_progress_message(completed: usize, total: usize) -> String {
    format!("正在解析图片 ({}/{})...", completed, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_block_is_a_blockquote() {
        let block = annotation_block("a red circle");
        assert_eq!(block, "\n\n> **[AI图解]** a red circle\n\n");
    }

    #[test]
    fn progress_message_counts() {
        assert_eq!(describe_progress_message(3, 7), "正在解析图片 (3/7)...");
    }
}
