//! 意图识别：关键词规则匹配（不调用 LLM）
//!
//! 每个类别一组关键词，命中数最多的类别胜出；命中数相同时按 Intent::ALL 的顺序。
//! ASCII 关键词按词边界匹配（避免 "this" 命中 "hi"），中文关键词按子串匹配。

use serde::{Deserialize, Serialize};

/// 识别出的意图类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// 代码相关（编写、调试、解释）
    Code,
    /// 屏幕 / 图片
    Vision,
    /// 复杂分析、比较、推理
    ComplexAnalysis,
    /// 本机控制（进程、应用、鼠标键盘）
    System,
    /// 联网搜索
    Search,
    /// 文档生成、总结
    Document,
    /// 普通对话
    General,
}

impl Intent {
    pub const ALL: [Intent; 7] = [
        Intent::Code,
        Intent::Vision,
        Intent::ComplexAnalysis,
        Intent::System,
        Intent::Search,
        Intent::Document,
        Intent::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Code => "code",
            Intent::Vision => "vision",
            Intent::ComplexAnalysis => "complex_analysis",
            Intent::System => "system",
            Intent::Search => "search",
            Intent::Document => "document",
            Intent::General => "general",
        }
    }

    /// 路由时需要的 Agent 能力
    pub fn capability(&self) -> &'static str {
        match self {
            Intent::Code => "code",
            Intent::Vision => "vision",
            Intent::ComplexAnalysis => "reasoning",
            Intent::System => "system_control",
            Intent::Search => "web_search",
            Intent::Document => "documents",
            Intent::General => "chat",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Intent::Code => &[
                "code", "function", "bug", "compile", "compiler", "rust", "python",
                "javascript", "typescript", "refactor", "debug", "script", "stack trace",
                "```", "代码", "函数", "编程", "调试", "报错",
            ],
            Intent::Vision => &[
                "screen", "screenshot", "image", "picture", "photo", "on my screen",
                "look at", "window", "屏幕", "截图", "图片", "照片", "看看",
            ],
            Intent::ComplexAnalysis => &[
                "analyze", "analyse", "analysis", "compare", "evaluate", "why",
                "reasoning", "strategy", "pros and cons", "trade-off", "tradeoff",
                "分析", "比较", "评估", "推理", "为什么",
            ],
            Intent::System => &[
                "open", "launch", "close", "kill", "process", "click", "type", "mouse",
                "keyboard", "volume", "shutdown", "打开", "关闭", "进程", "点击", "启动",
            ],
            Intent::Search => &[
                "search", "google", "look up", "latest", "news", "weather", "online",
                "搜索", "查一下", "新闻", "天气",
            ],
            Intent::Document => &[
                "document", "report", "summarize", "summary", "pdf", "docx", "memo",
                "文档", "报告", "总结", "摘要",
            ],
            Intent::General => &[
                "hello", "hi", "hey", "thanks", "thank you", "what is", "who is",
                "tell me", "你好", "谢谢", "是什么",
            ],
        }
    }
}

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    /// 胜出类别的关键词命中数
    pub hits: usize,
}

/// 关键词分类；无任何命中时返回 None
pub fn classify(message: &str) -> Option<Classification> {
    let lower = message.to_lowercase();
    let mut best: Option<Classification> = None;
    for intent in Intent::ALL {
        let hits = intent
            .keywords()
            .iter()
            .filter(|kw| contains_keyword(&lower, kw))
            .count();
        if hits == 0 {
            continue;
        }
        match &best {
            Some(b) if b.hits >= hits => {}
            _ => best = Some(Classification { intent, hits }),
        }
    }
    best
}

/// ASCII 字母数字关键词要求两侧不是字母数字；其它关键词按子串
fn contains_keyword(text: &str, keyword: &str) -> bool {
    let word_like = keyword
        .chars()
        .any(|c| c.is_ascii_alphanumeric())
        && keyword.is_ascii();
    if !word_like {
        return text.contains(keyword);
    }
    text.match_indices(keyword).any(|(start, _)| {
        let end = start + keyword.len();
        let before_ok = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_code() {
        let c = classify("Can you debug this Rust function?").unwrap();
        assert_eq!(c.intent, Intent::Code);
        assert_eq!(c.hits, 3);
    }

    #[test]
    fn test_classify_vision_chinese() {
        let c = classify("帮我看看屏幕上是什么").unwrap();
        assert_eq!(c.intent, Intent::Vision);
    }

    #[test]
    fn test_classify_complex_analysis() {
        let c = classify("Compare these two strategies and evaluate the trade-off").unwrap();
        assert_eq!(c.intent, Intent::ComplexAnalysis);
    }

    #[test]
    fn test_no_keywords_is_none() {
        assert!(classify("qwerty zxcv").is_none());
        assert!(classify("").is_none());
    }

    #[test]
    fn test_word_boundaries() {
        // "this" 不应命中 "hi"，"typed" 不应命中 "type"
        assert!(classify("this typed").is_none());
        assert!(contains_keyword("say hi!", "hi"));
        assert!(contains_keyword("please look up rust", "look up"));
    }

    #[test]
    fn test_tie_uses_category_order() {
        // code 与 search 各命中一次，code 在前
        let c = classify("search code").unwrap();
        assert_eq!(c.intent, Intent::Code);
        assert_eq!(c.hits, 1);
    }
}
