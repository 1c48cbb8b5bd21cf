//! HTML 页面渲染：目录列表、根目录设置、上传结果与错误页。

use axum::http::StatusCode;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::time::SystemTime;

use crate::config::ADMIN_ROUTE;
use crate::listing::{DirectoryEntry, SortKey, SortOrder};

const PAGE_STYLE: &str = r#"
    body { font-family: sans-serif; padding: 20px; line-height: 1.6; }
    h2 { margin-top: 0; }
    ul.entries { list-style: none; padding-left: 0; }
    ul.entries li { padding: 2px 0; }
    .admin-btn { position: absolute; top: 20px; right: 20px; padding: 10px 15px;
        background-color: #007bff; color: white; text-decoration: none; border-radius: 5px;
        font-size: 14px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
    .admin-btn:hover { background-color: #0056b3; }
    .sort a { margin-right: 12px; }
    .sort a.active { font-weight: bold; }
    input { padding: 8px; border: 1px solid #ccc; border-radius: 4px; }
    button { padding: 8px 15px; background: #28a745; color: white; border: none;
        border-radius: 4px; cursor: pointer; }
    button:hover { background: #218838; }
"#;

const UPLOAD_SCRIPT: &str = r#"
<script>
document.getElementById('uForm').addEventListener('submit', e => {
    e.preventDefault();
    const f = document.getElementById('uFile').files[0];
    if (!f) return;

    const fd = new FormData();
    fd.append('file', f);

    const x = new XMLHttpRequest();
    const started = performance.now();
    x.open('POST', window.location.pathname);

    x.upload.onprogress = ev => {
        if (!ev.lengthComputable) return;
        const p = (ev.loaded / ev.total * 100).toFixed(1);
        const secs = Math.max((performance.now() - started) / 1000, 0.001);
        const s = (ev.loaded / secs / 1024).toFixed(1);
        document.getElementById('box').style.display = 'block';
        document.getElementById('bar').style.width = p + '%';
        document.getElementById('perc').textContent = p + '%';
        document.getElementById('speed').textContent = s + ' KB/s';
    };

    x.onload = () => {
        if (x.status >= 400) {
            document.open(); document.write(x.responseText); document.close();
            return;
        }
        window.location.reload();
    };
    x.onerror = () => { alert('Upload error'); };
    x.send(fd);
});
</script>
"#;

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// 人类可读的文件大小。
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if size < KB {
        format!("{size} B")
    } else if size < MB {
        format!("{} KB", size / KB)
    } else if size < GB {
        format!("{} MB", two_decimals(size as f64 / MB as f64))
    } else {
        format!("{} GB", two_decimals(size as f64 / GB as f64))
    }
}

fn two_decimals(value: f64) -> String {
    let formatted = format!("{value:.2}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

pub fn format_timestamp(timestamp: SystemTime) -> String {
    let datetime: DateTime<Local> = timestamp.into();
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 按扩展名选择图标。
pub fn icon_for(extension: &str) -> &'static str {
    match extension {
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tiff" | "svg" | "webp" | "heic" | "ico" => "🖼️",
        "pdf" | "doc" | "docx" | "odt" | "rtf" | "epub" => "📄",
        "txt" | "md" | "csv" | "log" => "📝",
        "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz" | "tgz" => "📦",
        "exe" | "msi" | "bin" | "sh" | "deb" | "apk" => "⚙️",
        "xls" | "xlsx" | "ods" => "📊",
        "ppt" | "pptx" | "odp" => "📈",
        "mp3" | "wav" | "flac" | "aac" | "wma" | "ogg" | "m4a" | "opus" => "🎵",
        "avi" | "mp4" | "mkv" | "mov" | "wmv" | "flv" | "webm" | "m4v" => "📽️",
        "py" => "🐍",
        "js" | "ts" => "✨",
        "html" | "htm" => "🌐",
        "css" => "🎨",
        "c" | "cpp" | "hpp" | "h" | "cc" | "cxx" => "💻",
        "java" => "☕",
        "cs" => "♯",
        "php" => "🐘",
        "go" => "🐹",
        "rb" => "💎",
        "swift" => "🐦",
        "scala" => "🔺",
        "dart" => "🎯",
        "rs" => "🦀",
        "lua" => "🌙",
        "json" | "yaml" | "yml" | "xml" | "toml" | "ini" => "🗒️",
        "iso" | "img" => "💿",
        _ => "❓",
    }
}

/// 把路径各段分别百分号编码后拼成绝对 href。
pub fn encode_href(path: &str) -> String {
    let encoded = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{encoded}")
}

fn parent_path(path: &str) -> Option<String> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(match trimmed.rsplit_once('/') {
        Some((parent, _)) => format!("/{parent}"),
        None => "/".to_string(),
    })
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>{}</title><style>{PAGE_STYLE}</style></head><body>\n{body}\n</body></html>\n",
        escape_html(title)
    )
}

/// 目录列表页；`request_path` 为已解码的请求路径。
pub fn render_listing(
    request_path: &str,
    entries: &[DirectoryEntry],
    key: SortKey,
    order: SortOrder,
) -> String {
    let display_path = format!("/{}", request_path.trim_matches('/'));
    let self_href = encode_href(request_path);
    let mut body = String::new();

    let _ = write!(
        body,
        "<a href=\"{ADMIN_ROUTE}\" class=\"admin-btn\">⚙️ Set Root</a>\n<h2>Directory: {}</h2>",
        escape_html(&display_path)
    );
    if let Some(parent) = parent_path(request_path) {
        let _ = write!(
            body,
            "<a href=\"{}\">[Go&nbsp;up]</a>",
            escape_html(&encode_href(&parent))
        );
    }
    body.push_str(
        r#"<hr>
<h3>Upload file</h3>
<form id="uForm">
    <input type="file" id="uFile" name="file" required>
    <button type="submit">Upload</button>
</form>
<div id="box" style="display:none;margin:20px 0;">
    <div style="display:flex;justify-content:space-between;">
        <span id="perc">0%</span><span id="speed">0 KB/s</span>
    </div>
    <div style="height:20px;background:#eee;border-radius:10px;">
        <div id="bar" style="height:100%;width:0%;background:#4CAF50;border-radius:10px;"></div>
    </div>
</div>
"#,
    );
    body.push_str(UPLOAD_SCRIPT);

    body.push_str("<hr><h3>Contents</h3>\n<div class=\"sort\">Sort by: ");
    for candidate in SortKey::ALL {
        let (next_order, class, arrow) = if candidate == key {
            let arrow = match order {
                SortOrder::Asc => " ▲",
                SortOrder::Desc => " ▼",
            };
            (order.toggled(), " class=\"active\"", arrow)
        } else {
            (SortOrder::Asc, "", "")
        };
        let _ = write!(
            body,
            "<a{class} href=\"{}?sort={}&amp;dir={}\">{}{arrow}</a>",
            escape_html(&self_href),
            candidate.as_str(),
            next_order.as_str(),
            candidate.as_str()
        );
    }
    body.push_str("</div>\n<ul class=\"entries\">\n");

    let base = request_path.trim_matches('/');
    for entry in entries {
        let href = encode_href(&format!("{base}/{}", entry.name));
        let name = escape_html(&entry.name);
        if entry.is_dir() {
            let _ = writeln!(
                body,
                "<li>📁 <a href=\"{}\">{name}</a></li>",
                escape_html(&href)
            );
        } else {
            let modified = entry
                .modified
                .map(format_timestamp)
                .unwrap_or_else(|| "unknown".to_string());
            let _ = writeln!(
                body,
                "<li>{} <a download href=\"{}\">{name}</a> <small>({}, {})</small></li>",
                icon_for(&entry.extension),
                escape_html(&href),
                format_size(entry.size),
                modified
            );
        }
    }
    body.push_str("</ul>");

    page(&display_path, &body)
}

pub fn render_listing_failure(request_path: &str) -> String {
    let display_path = format!("/{}", request_path.trim_matches('/'));
    page(
        &display_path,
        &format!("<h2>Cannot list {}</h2>", escape_html(&display_path)),
    )
}

pub fn render_admin_page(current_root: &str) -> String {
    let root = escape_html(current_root);
    page(
        "Set Root Directory",
        &format!(
            r#"<h2>⚙️ Set Root Directory</h2>
<p>Current root: <code>{root}</code></p>
<form method="POST" action="{ADMIN_ROUTE}">
  <label>New root path:</label><br><br>
  <input name="new_root" value="{root}" style="width:80%" required>
  <button type="submit">Set root</button>
</form>
<p><small>Use absolute paths or relative paths (expanded from user home).</small></p>
<a href="/">← Back to Files</a>"#
        ),
    )
}

pub fn render_root_changed(new_root: &str) -> String {
    page(
        "Root updated",
        &format!(
            "<h2>Root set to: {}</h2><a href=\"/\">Go to Home</a>",
            escape_html(new_root)
        ),
    )
}

pub fn render_upload_done(filename: &str, back_href: &str) -> String {
    page(
        "Upload complete",
        &format!(
            "<h2>File '{}' uploaded!</h2><a href=\"{}\">Back</a>",
            escape_html(filename),
            escape_html(back_href)
        ),
    )
}

pub fn render_error_page(status: StatusCode, message: &str) -> String {
    let title = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );
    page(&title, &format!("<h2>{}</h2>", escape_html(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::EntryKind;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_size(1_572_864), "1.5 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 + 1024 * 1024 * 300), "3.29 GB");
    }

    #[test]
    fn icons_follow_extension_families() {
        assert_eq!(icon_for("jpg"), "🖼️");
        assert_eq!(icon_for("rs"), "🦀");
        assert_eq!(icon_for("flac"), "🎵");
        assert_eq!(icon_for(""), "❓");
    }

    #[test]
    fn hrefs_encode_each_segment() {
        assert_eq!(encode_href("docs/my file#1.pdf"), "/docs/my%20file%231.pdf");
        assert_eq!(encode_href("/"), "/");
        assert_eq!(parent_path("/docs/2024/"), Some("/docs".to_string()));
        assert_eq!(parent_path("/docs"), Some("/".to_string()));
        assert_eq!(parent_path("/"), None);
    }

    #[test]
    fn listing_escapes_names_and_marks_active_sort() {
        let entries = vec![
            DirectoryEntry {
                name: "<script>.txt".into(),
                kind: EntryKind::File,
                size: 2048,
                modified: None,
                extension: "txt".into(),
            },
            DirectoryEntry {
                name: "photos".into(),
                kind: EntryKind::Directory,
                size: 0,
                modified: None,
                extension: String::new(),
            },
        ];
        let html = render_listing("/docs/", &entries, SortKey::Size, SortOrder::Asc);

        assert!(html.contains("Directory: /docs"));
        assert!(html.contains("&lt;script&gt;.txt"));
        assert!(!html.contains("<script>.txt"));
        assert!(html.contains("href=\"/docs/%3Cscript%3E.txt\""));
        assert!(html.contains("📁 <a href=\"/docs/photos\">photos</a>"));
        assert!(html.contains("<a class=\"active\" href=\"/docs?sort=size&amp;dir=desc\">size ▲</a>"));
        assert!(html.contains("(2 KB, unknown)"));
        assert!(html.contains("[Go&nbsp;up]"));
    }
}
