//! 로그 항목과 렌더링
//!
//! 항목은 생성 이후 변경되지 않으며, 작성기가 렌더링 시점에
//! [`ExtConfig`]를 읽어 String/JSON/XML 중 하나로 형식화합니다.

use chrono::{DateTime, Local, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::level::{Level, LevelSyms};

/// 구조화 렌더링 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageStruct {
    /// 한 줄 텍스트
    #[default]
    String,
    /// 한 줄 JSON 객체
    Json,
    /// `<entry>` XML 요소
    Xml,
}

/// 확장 메타데이터 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtConfig {
    /// 렌더링 형식
    pub structured: MessageStruct,
    /// 호스트 이름 첨부 여부
    pub hostname: bool,
    /// 프로세스 이름 첨부 여부
    pub pname: bool,
    /// 프로세스 ID 첨부 여부
    pub pid: bool,
    /// 스레드 이름 첨부 여부
    pub tname: bool,
    /// 스레드 ID 첨부 여부
    pub tid: bool,
}

impl ExtConfig {
    /// 지정 형식과 필드 선택으로 생성
    pub fn new(
        structured: MessageStruct,
        hostname: bool,
        pname: bool,
        pid: bool,
        tname: bool,
        tid: bool,
    ) -> Self {
        Self {
            structured,
            hostname,
            pname,
            pid,
            tname,
            tid,
        }
    }

    /// 확장 필드가 하나라도 선택되었는지 확인
    pub fn wants_fields(&self) -> bool {
        self.hostname || self.pname || self.pid || self.tname || self.tid
    }
}

/// 항목에 첨부된 확장 필드
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,
}

struct ProcessInfo {
    hostname: String,
    pname: String,
    pid: u32,
}

static PROCESS_INFO: Lazy<ProcessInfo> = Lazy::new(|| ProcessInfo {
    hostname: sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string()),
    pname: process_name(),
    pid: std::process::id(),
});

fn process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// 호스트 이름 (프로세스 시작 후 한 번만 조회)
pub fn hostname() -> &'static str {
    &PROCESS_INFO.hostname
}

/// 현재 프로세스 이름
pub fn pname() -> &'static str {
    &PROCESS_INFO.pname
}

impl ExtFields {
    /// 정책에 따라 호출 스레드 기준으로 확장 필드 수집
    pub fn collect(config: &ExtConfig, force_thread: bool) -> Option<Self> {
        if !config.wants_fields() && !force_thread {
            return None;
        }
        let info = &*PROCESS_INFO;
        let thread = std::thread::current();
        let with_tname = config.tname || force_thread;
        let with_tid = config.tid || force_thread;
        Some(Self {
            hostname: config.hostname.then(|| info.hostname.clone()),
            pname: config.pname.then(|| info.pname.clone()),
            pid: config.pid.then_some(info.pid),
            tname: with_tname.then(|| thread.name().unwrap_or("unnamed").to_string()),
            tid: with_tid.then(|| format!("{:?}", thread.id())),
        })
    }
}

/// 불변 로그 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// 생성 시각
    pub time: DateTime<Utc>,
    /// 로그 레벨
    pub level: Level,
    /// 도메인 태그
    pub domain: String,
    /// 메시지 본문
    pub message: String,
    /// 확장 필드 (정책이 요구할 때만)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<ExtFields>,
}

impl Entry {
    /// 새 항목 생성
    pub fn new(level: Level, domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            level,
            domain: domain.into(),
            message: message.into(),
            ext: None,
        }
    }

    /// 확장 필드 설정
    pub fn with_ext(mut self, ext: Option<ExtFields>) -> Self {
        self.ext = ext;
        self
    }
}

/// 항목 렌더러
///
/// 작성기마다 하나씩 가지며 색상 여부만 작성기별로 다릅니다.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    colored: bool,
}

impl Renderer {
    /// 새 렌더러 생성
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    /// 항목을 한 줄로 렌더링 (개행 미포함)
    pub fn render(&self, entry: &Entry, config: &ExtConfig, syms: LevelSyms) -> String {
        match config.structured {
            MessageStruct::String => self.render_text(entry, syms),
            MessageStruct::Json => render_json(entry, syms),
            MessageStruct::Xml => render_xml(entry, syms),
        }
    }

    fn render_text(&self, entry: &Entry, syms: LevelSyms) -> String {
        let time = entry.time.with_timezone(&Local).format("%Y.%m.%d %H:%M:%S");
        let mut line = format!("{} ", time);

        if let Some(ext) = &entry.ext {
            if let Some(host) = &ext.hostname {
                line.push_str(host);
                line.push(' ');
            }
            match (&ext.pname, ext.pid) {
                (Some(name), Some(pid)) => line.push_str(&format!("{}[{}] ", name, pid)),
                (Some(name), None) => line.push_str(&format!("{} ", name)),
                (None, Some(pid)) => line.push_str(&format!("[{}] ", pid)),
                (None, None) => {}
            }
            match (&ext.tname, &ext.tid) {
                (Some(name), Some(tid)) => line.push_str(&format!("{}[{}] ", name, tid)),
                (Some(name), None) => line.push_str(&format!("{} ", name)),
                (None, Some(tid)) => line.push_str(&format!("[{}] ", tid)),
                (None, None) => {}
            }
        }

        if !entry.domain.is_empty() {
            line.push_str(&entry.domain);
            line.push(' ');
        }

        let label = syms.label(entry.level);
        if self.colored {
            line.push_str(&format!("{}{}\x1b[0m", entry.level.color_code(), label));
        } else {
            line.push_str(label);
        }
        line.push_str(": ");
        line.push_str(&entry.message);
        line
    }
}

fn render_json(entry: &Entry, syms: LevelSyms) -> String {
    let mut object = serde_json::Map::new();
    object.insert("time".into(), entry.time.to_rfc3339().into());
    object.insert("level".into(), syms.label(entry.level).into());
    object.insert("domain".into(), entry.domain.clone().into());
    object.insert("message".into(), entry.message.clone().into());
    if let Some(ext) = &entry.ext {
        if let Some(v) = &ext.hostname {
            object.insert("hostname".into(), v.clone().into());
        }
        if let Some(v) = &ext.pname {
            object.insert("pname".into(), v.clone().into());
        }
        if let Some(v) = ext.pid {
            object.insert("pid".into(), v.into());
        }
        if let Some(v) = &ext.tname {
            object.insert("tname".into(), v.clone().into());
        }
        if let Some(v) = &ext.tid {
            object.insert("tid".into(), v.clone().into());
        }
    }
    serde_json::Value::Object(object).to_string()
}

fn render_xml(entry: &Entry, syms: LevelSyms) -> String {
    let mut xml = String::from("<entry>");
    push_element(&mut xml, "time", &entry.time.to_rfc3339());
    push_element(&mut xml, "level", syms.label(entry.level));
    push_element(&mut xml, "domain", &entry.domain);
    push_element(&mut xml, "message", &entry.message);
    if let Some(ext) = &entry.ext {
        if let Some(v) = &ext.hostname {
            push_element(&mut xml, "hostname", v);
        }
        if let Some(v) = &ext.pname {
            push_element(&mut xml, "pname", v);
        }
        if let Some(v) = ext.pid {
            push_element(&mut xml, "pid", &v.to_string());
        }
        if let Some(v) = &ext.tname {
            push_element(&mut xml, "tname", v);
        }
        if let Some(v) = &ext.tid {
            push_element(&mut xml, "tid", v);
        }
    }
    xml.push_str("</entry>");
    xml
}

fn push_element(xml: &mut String, name: &str, text: &str) {
    xml.push('<');
    xml.push_str(name);
    xml.push('>');
    for c in text.chars() {
        match c {
            '&' => xml.push_str("&amp;"),
            '<' => xml.push_str("&lt;"),
            '>' => xml.push_str("&gt;"),
            '"' => xml.push_str("&quot;"),
            '\'' => xml.push_str("&apos;"),
            _ => xml.push(c),
        }
    }
    xml.push_str("</");
    xml.push_str(name);
    xml.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Entry {
        Entry::new(Level::Warning, "net", "disk <almost> full & hot")
    }

    #[test]
    fn test_text_rendering() {
        let renderer = Renderer::new(false);
        let line = renderer.render(&sample(), &ExtConfig::default(), LevelSyms::Str);
        assert!(line.ends_with("net WARNING: disk <almost> full & hot"));

        let line = renderer.render(&sample(), &ExtConfig::default(), LevelSyms::Short);
        assert!(line.contains("net WRN: "));
    }

    #[test]
    fn test_colored_text_wraps_label() {
        let renderer = Renderer::new(true);
        let line = renderer.render(&sample(), &ExtConfig::default(), LevelSyms::Str);
        assert!(line.contains("\x1b[33mWARNING\x1b[0m"));
    }

    #[test]
    fn test_json_rendering_with_ext_fields() {
        let config = ExtConfig::new(MessageStruct::Json, true, false, true, false, false);
        let entry = sample().with_ext(ExtFields::collect(&config, false));
        let line = Renderer::new(false).render(&entry, &config, LevelSyms::Str);

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["level"], "WARNING");
        assert_eq!(value["domain"], "net");
        assert_eq!(value["pid"], std::process::id());
        assert!(value.get("hostname").is_some());
        assert!(value.get("tname").is_none());
    }

    #[test]
    fn test_xml_rendering_escapes_text() {
        let config = ExtConfig::new(MessageStruct::Xml, false, false, false, false, false);
        let line = Renderer::new(false).render(&sample(), &config, LevelSyms::Sym);
        assert!(line.starts_with("<entry>"));
        assert!(line.contains("<level>W</level>"));
        assert!(line.contains("<message>disk &lt;almost&gt; full &amp; hot</message>"));
    }

    #[test]
    fn test_collect_without_policy() {
        assert!(ExtFields::collect(&ExtConfig::default(), false).is_none());
        let forced = ExtFields::collect(&ExtConfig::default(), true).unwrap();
        assert!(forced.tid.is_some());
        assert!(forced.hostname.is_none());
    }

    #[test]
    fn test_entry_serde_preserves_fields() {
        let config = ExtConfig::new(MessageStruct::String, true, true, true, true, true);
        let entry = sample().with_ext(ExtFields::collect(&config, false));
        let json = serde_json::to_string(&entry).unwrap();
        let decoded: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, entry);
    }
}
