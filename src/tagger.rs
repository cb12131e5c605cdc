use reqwest::Url;

/// Exact host → tags. Order matters for the substring fallback.
const DOMAIN_TAGS: &[(&str, &[&str])] = &[
    ("github.com", &["开发", "代码"]),
    ("stackoverflow.com", &["编程", "问答"]),
    ("medium.com", &["博客", "文章"]),
    ("youtube.com", &["视频"]),
    ("bilibili.com", &["视频", "B站"]),
    ("zhihu.com", &["知乎", "问答"]),
    ("juejin.cn", &["掘金", "技术"]),
    ("csdn.net", &["CSDN", "技术"]),
    ("baidu.com", &["百度", "搜索"]),
    ("google.com", &["谷歌", "搜索"]),
];

/// Title triggers (matched case-insensitively) → tag.
const TITLE_TAGS: &[(&[&str], &str)] = &[
    (&["tutorial", "教程"], "教程"),
    (&["tool", "工具"], "工具"),
    (&["doc", "api", "文档"], "文档"),
    (&["news", "新闻"], "新闻"),
];

/// Suggest tags for a page. Malformed URLs yield no tags.
pub fn suggest_tags(url: &str, title: &str) -> Vec<String> {
    let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) else {
        return Vec::new();
    };
    let domain = host.strip_prefix("www.").unwrap_or(&host);

    let mut tags: Vec<String> = Vec::new();
    let domain_hit = DOMAIN_TAGS
        .iter()
        .find(|(key, _)| *key == domain)
        .or_else(|| {
            DOMAIN_TAGS.iter().find(|(key, _)| {
                let name = key.split('.').next().unwrap_or(*key);
                domain.contains(name)
            })
        });
    if let Some((_, domain_tags)) = domain_hit {
        tags.extend(domain_tags.iter().map(|t| t.to_string()));
    }

    let title_lower = title.to_lowercase();
    for (triggers, tag) in TITLE_TAGS {
        if triggers.iter().any(|t| title_lower.contains(t)) {
            tags.push(tag.to_string());
        }
    }

    dedup_tags(tags)
}

/// Drop repeats and blanks, keeping first-seen order.
pub fn dedup_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Split a user-entered `a, b ,c` list.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    dedup_tags(raw.split(','))
}
