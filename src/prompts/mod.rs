//! Prompt construction for every generation request.
//!
//! Request prompts are Korean because the output is published on Korean
//! blogging platforms; image prompts stay in English.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tera::{Context as TeraContext, Tera};

const TOPICS_TEMPLATE: &str = include_str!("templates/topics.tera");
const POST_TEMPLATE: &str = include_str!("templates/post.tera");
const TAGS_TEMPLATE: &str = include_str!("templates/tags.tera");
const SNS_TEMPLATE: &str = include_str!("templates/sns.tera");

const TOPIC_COUNT: usize = 5;
const TAG_COUNT: usize = 10;
pub const TAG_SOURCE_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicKind {
    Category,
    Eeat,
    Evergreen,
    Longtail,
    Memo,
}

impl TopicKind {
    pub const ALL: [TopicKind; 5] = [
        TopicKind::Category,
        TopicKind::Eeat,
        TopicKind::Evergreen,
        TopicKind::Longtail,
        TopicKind::Memo,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase().replace('-', "");
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKind::Category => "category",
            TopicKind::Eeat => "eeat",
            TopicKind::Evergreen => "evergreen",
            TopicKind::Longtail => "longtail",
            TopicKind::Memo => "memo",
        }
    }

    /// Heading shown above a result of this kind.
    pub fn heading(&self) -> &'static str {
        match self {
            TopicKind::Category => "카테고리별 추천",
            TopicKind::Eeat => "E-EAT 기반 추천",
            TopicKind::Evergreen => "에버그린 콘텐츠",
            TopicKind::Longtail => "롱테일 키워드",
            TopicKind::Memo => "메모/파일 기반",
        }
    }

    fn role(&self) -> &'static str {
        match self {
            TopicKind::Category => "블로그 주제 전문가",
            TopicKind::Eeat => "SEO 전문가",
            TopicKind::Evergreen => "콘텐츠 전략가",
            TopicKind::Longtail => "키워드 분석 전문가",
            TopicKind::Memo => "콘텐츠 큐레이터",
        }
    }

    fn ask(&self) -> &'static str {
        match self {
            TopicKind::Category => "카테고리에 대한 블로그 주제",
            TopicKind::Eeat => {
                "분야에서 E-EAT(경험, 전문성, 권위성, 신뢰성)을 충족하는 심층 블로그 주제"
            }
            TopicKind::Evergreen => {
                "주제와 관련하여 시간이 지나도 가치가 변하지 않는 에버그린 콘텐츠 주제"
            }
            TopicKind::Longtail => "키워드와 관련된 롱테일 키워드 기반 블로그 주제",
            TopicKind::Memo => "",
        }
    }

    fn requirements(&self) -> [&'static str; 4] {
        match self {
            TopicKind::Category => [
                "최신 트렌드를 반영한 주제",
                "검색 수요가 있는 주제",
                "독자의 관심을 끌 수 있는 주제",
                "각 주제는 구체적이고 명확해야 함",
            ],
            TopicKind::Eeat => [
                "전문성을 보여줄 수 있는 주제",
                "깊이 있는 분석이 가능한 주제",
                "권위 있는 정보를 제공할 수 있는 주제",
                "독자에게 실질적인 가치를 제공하는 주제",
            ],
            TopicKind::Evergreen => [
                "시간이 지나도 유효한 정보",
                "기초적이고 본질적인 내용",
                "지속적인 검색 수요가 있는 주제",
                "초보자도 이해하기 쉬운 주제",
            ],
            TopicKind::Longtail => [
                "경쟁이 낮은 세부 주제",
                "검색 의도가 명확한 주제",
                "구체적이고 타겟팅된 주제",
                "실제 검색할 법한 질문 형태",
            ],
            TopicKind::Memo => [
                "메모의 핵심 내용을 파악",
                "블로그 독자에게 유용한 형태로 재구성",
                "각 주제는 독립적인 글이 될 수 있어야 함",
                "실용적이고 가치 있는 주제",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritingStyle {
    #[default]
    Friendly,
    Expert,
}

impl WritingStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "friendly" => Some(WritingStyle::Friendly),
            "expert" => Some(WritingStyle::Expert),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WritingStyle::Friendly => "friendly",
            WritingStyle::Expert => "expert",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WritingStyle::Friendly => "친근형",
            WritingStyle::Expert => "전문가형",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            WritingStyle::Friendly => "감정 표현, 개인적 경험, 대화체",
            WritingStyle::Expert => "논리적 구조, 고급 어휘, 신뢰감",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            WritingStyle::Friendly => {
                "친근하고 대화하듯이 작성하세요. 개인적인 경험과 감정을 표현하고, 독자와 소통하는 느낌으로 작성합니다."
            }
            WritingStyle::Expert => {
                "전문적이고 신뢰감 있게 작성하세요. 논리적인 구조와 고급 어휘를 사용하며, 객관적이고 권위 있는 톤을 유지합니다."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogImageKind {
    Main,
    Sub,
}

pub fn render_topics_prompt(kind: TopicKind, input: &str) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("kind", kind.as_str());
    context.insert("role", kind.role());
    context.insert("ask", kind.ask());
    context.insert("input", input.trim());
    context.insert("count", &TOPIC_COUNT);
    context.insert("requirements", &kind.requirements());
    Tera::one_off(TOPICS_TEMPLATE, &context, false)
        .with_context(|| format!("failed to render {} topics prompt", kind.as_str()))
}

pub fn render_post_prompt(
    title: &str,
    style: WritingStyle,
    additional: Option<&str>,
) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("title", title.trim());
    context.insert("style", style.instruction());
    context.insert(
        "additional",
        additional.map(str::trim).filter(|value| !value.is_empty()).unwrap_or(""),
    );
    Tera::one_off(POST_TEMPLATE, &context, false).with_context(|| "failed to render post prompt")
}

/// Only the head of the post is sent for tagging.
pub fn render_tags_prompt(content: &str) -> Result<String> {
    let head = content.chars().take(TAG_SOURCE_CHARS).collect::<String>();
    let mut context = TeraContext::new();
    context.insert("content", &head);
    context.insert("count", &TAG_COUNT);
    Tera::one_off(TAGS_TEMPLATE, &context, false).with_context(|| "failed to render tags prompt")
}

pub fn render_sns_prompt(title: &str, summary: &str) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("title", title.trim());
    context.insert("summary", summary.trim());
    Tera::one_off(SNS_TEMPLATE, &context, false).with_context(|| "failed to render SNS prompt")
}

pub fn blog_image_prompt(topic: &str, kind: BlogImageKind) -> String {
    match kind {
        BlogImageKind::Main => format!(
            "Create a featured blog image for an article about \"{}\". The image should be eye-catching, professional, and relevant to the topic.",
            topic.trim()
        ),
        BlogImageKind::Sub => format!(
            "Create a supporting image for a blog article section about \"{}\". The image should complement the main content and provide visual context.",
            topic.trim()
        ),
    }
}

pub fn thumbnail_background_prompt(description: &str) -> String {
    format!(
        "Create a background image for a blog thumbnail about \"{}\". The image should have space for text overlay, be visually appealing, and not too busy.",
        description.trim()
    )
}
