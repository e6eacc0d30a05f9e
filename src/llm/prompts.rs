//! Section Prompts and Canned Fallbacks
//!
//! One natural-language instruction per content section, plus the canned
//! text substituted when the backend fails or returns an unusable reply.
//! The learner-facing content is Chinese: the product explains English
//! words to Chinese speakers.

use crate::types::Section;

/// Prompt for the immediate first-call path. Short on purpose: it has to
/// produce something usable before the user sees the card.
pub fn fast_prompt(word: &str) -> String {
    format!(
        "请解释英语单词 \"{word}\" 的中文含义，简要说明词性和基本用法。请不要返回Thinking过程"
    )
}

/// Prompt for one deep-enrichment section.
pub fn section_prompt(word: &str, section: Section) -> String {
    match section {
        Section::BasicMeaning => fast_prompt(word),
        Section::DetailedMeaning => format!(
            "请详细解释英语单词 \"{word}\" 的含义：\n\
             1. 在不同语境下的含义\n\
             2. 常见用法\n\
             3. 重要说明\n\
             请用中文详细说明。 请不要返回Thinking过程"
        ),
        Section::UsageExamples => format!(
            "请提供英语单词 \"{word}\" 的使用例句：\n\
             1. 日常对话例句 (英文+中文翻译)\n\
             2. 书面语例句 (英文+中文翻译)\n\
             3. 专业场合例句 (英文+中文翻译)\n\
             每个例句都要有中文翻译。 请不要返回Thinking过程"
        ),
        Section::Synonyms => format!(
            "请列出英语单词 \"{word}\" 的近义词：\n\
             1. 列出3-5个常见近义词\n\
             2. 简单说明它们的区别\n\
             3. 举例说明用法差异\n\
             请用中文说明。 请不要返回Thinking过程"
        ),
        Section::Collocations => format!(
            "请提供英语单词 \"{word}\" 的常用搭配：\n\
             1. 常见的词组搭配\n\
             2. 固定短语表达\n\
             3. 习惯用法\n\
             请用中文说明含义。 请不要返回Thinking过程"
        ),
    }
}

/// Canned fallback for a section whose generation failed or came back
/// empty. Not an error path: the document stays valid and the card stays
/// editable by hand.
pub fn fallback(word: &str, section: Section) -> String {
    match section {
        Section::BasicMeaning => format!(
            "**含义：** 英语单词 \"{word}\"\n\n\
             **使用场景：**\n\
             1. 日常交流中使用\n\
             2. 书面表达中使用\n\n\
             **近义词：** 相关词汇"
        ),
        Section::DetailedMeaning => {
            "暂无详细释义。本地模型暂时不可用，请稍后重试或点击编辑按钮手动补充。".to_string()
        }
        Section::UsageExamples => {
            "暂无使用例句。本地模型暂时不可用，请稍后重试或点击编辑按钮手动补充。".to_string()
        }
        Section::Synonyms => {
            "暂无近义词对比。本地模型暂时不可用，请稍后重试或点击编辑按钮手动补充。".to_string()
        }
        Section::Collocations => {
            "暂无常用搭配。本地模型暂时不可用，请稍后重试或点击编辑按钮手动补充。".to_string()
        }
    }
}
