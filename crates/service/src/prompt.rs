use std::fmt::Write;

use readingtype_core::{Dictionary, DEFAULT_CODE, FIELD_COUNT, SEPARATOR};

const INTRO: &str = "你是ReadingType智能编码助手，专门帮助用户进行IEC61968-9-2024标准的ReadingType编码生成和管理。";

const DUTIES: &str = "你的主要功能：
1. 生成ReadingType编码 - 基于用户描述智能生成新的编码
2. 编码验证 - 检查编码的有效性和规范性
3. 编码解析 - 将16位编码解析为可读的中文描述
4. 字段解释 - 解释各字段的含义和取值规范

专注于根据用户的量测需求描述，智能分析并生成准确的ReadingTypeID编码。

请用专业、准确的方式回答用户关于ReadingType编码的问题。";

/// Renders the relay's system prompt from the loaded dictionary, one line
/// per field listing every admissible code.
pub fn system_prompt(dictionary: &Dictionary) -> String {
    let mut prompt = String::from(INTRO);
    prompt.push_str("\n\n");
    let _ = writeln!(
        prompt,
        "ReadingType编码结构（{FIELD_COUNT}个字段，以“{SEPARATOR}”分隔，未指定的字段取{DEFAULT_CODE}）："
    );
    for field in dictionary.fields() {
        let values = field
            .values
            .iter()
            .map(|entry| format!("{}={}", entry.code, entry.native))
            .collect::<Vec<_>>()
            .join("，");
        let _ = writeln!(
            prompt,
            "{}. {} - {}（{}）",
            field.position, field.name, field.display_name, values
        );
    }
    prompt.push('\n');
    prompt.push_str(DUTIES);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_field_in_position_order() {
        let dict = Dictionary::standard();
        let prompt = system_prompt(&dict);
        let lines: Vec<_> = prompt
            .lines()
            .filter(|line| line.contains(" - ") && line.contains("（"))
            .collect();
        assert_eq!(lines.len(), FIELD_COUNT);
        assert!(lines[0].starts_with("1. macroPeriod - 宏周期（0=无，1=年"));
        assert!(lines[15].starts_with("16. currency - 货币"));
    }

    #[test]
    fn agrees_with_the_dictionary_table() {
        let dict = Dictionary::standard();
        let prompt = system_prompt(&dict);
        assert!(prompt.contains("978=欧元，156=人民币"));
        assert!(prompt.contains("64=三相"));
        assert!(prompt.starts_with(INTRO));
        assert!(prompt.ends_with("关于ReadingType编码的问题。"));
    }
}
