//! 流式 multipart/form-data 解析。
//!
//! 请求体可能是几 GB 的媒体文件，因此解析器从不缓冲整个请求体：
//! [`BoundaryReader`] 只保留一个有界的前瞻缓冲区，按字节精确地查找
//! `CRLF--<boundary>` 分隔符，分隔符之前的内容直接写入临时文件。
//! 只有分隔符之后紧跟 `--` 或 CRLF 时才视为边界，正文中出现的其他
//! 类似边界的字节原样保留。

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::atomic::AtomicFile;
use crate::config::MULTIPART_HEADER_LINE_LIMIT;
use crate::listing::extension_of;

const READ_CHUNK: usize = 64 * 1024;
const MAX_BOUNDARY_LEN: usize = 200;
/// 分隔符与 `--`/CRLF 之间允许的空白上限，超出则视为正文。
const MAX_TRANSPORT_PADDING: usize = MAX_BOUNDARY_LEN;
const MAX_PART_HEADERS: usize = 32;

/// 允许上传的扩展名（小写，不含点号）。
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    // documents
    "pdf", "txt", "md", "csv", "log", "rtf", "doc", "docx", "odt", "xls", "xlsx", "ods", "ppt",
    "pptx", "odp", "epub",
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "tiff", "svg", "webp", "heic", "ico",
    // audio
    "mp3", "wav", "flac", "aac", "wma", "ogg", "m4a", "opus",
    // video
    "avi", "mp4", "mkv", "mov", "wmv", "flv", "webm", "m4v",
    // archives and disc images
    "zip", "rar", "7z", "tar", "gz", "bz2", "xz", "tgz", "iso", "img",
    // source and text formats
    "py", "js", "ts", "html", "htm", "css", "c", "cpp", "hpp", "h", "cc", "cxx", "java", "cs",
    "php", "go", "rb", "swift", "scala", "dart", "rs", "lua", "sh", "json", "yaml", "yml", "xml",
    "toml", "ini", "sql",
];

const ALLOWED_SAMPLE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("Bad multipart: boundary not found")]
    BoundaryNotFound,
    #[error("Bad multipart: {0}")]
    Malformed(&'static str),
    #[error("Missing file field")]
    MissingFile,
    #[error("File type not allowed: .{extension} (accepted types include {sample}, ...)")]
    ExtensionNotAllowed { extension: String, sample: String },
    #[error("upload interrupted: {0}")]
    Io(#[from] io::Error),
}

/// 一次上传的落盘目标：目标目录与清洗后的文件名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub directory: PathBuf,
    pub filename: String,
}

impl UploadTarget {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }
}

#[derive(Debug)]
pub struct StoredUpload {
    pub target: UploadTarget,
    pub bytes_written: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartEnd {
    Next,
    Close,
}

enum Suffix {
    Accept { consumed: usize, end: PartEnd },
    NeedMore,
    Reject,
}

/// 按字节扫描 multipart 请求体的前瞻读取器。
pub struct BoundaryReader<R> {
    inner: R,
    buf: Vec<u8>,
    eof: bool,
    dash_boundary: Vec<u8>,
    delimiter: Vec<u8>,
}

impl<R: AsyncRead + Unpin> BoundaryReader<R> {
    pub fn new(inner: R, boundary: &str) -> Self {
        let dash_boundary = format!("--{boundary}").into_bytes();
        let mut delimiter = b"\r\n".to_vec();
        delimiter.extend_from_slice(&dash_boundary);
        Self {
            inner,
            buf: Vec::with_capacity(READ_CHUNK),
            eof: false,
            dash_boundary,
            delimiter,
        }
    }

    async fn fill(&mut self) -> io::Result<bool> {
        if self.eof {
            return Ok(false);
        }
        let start = self.buf.len();
        self.buf.resize(start + READ_CHUNK, 0);
        match self.inner.read(&mut self.buf[start..]).await {
            Ok(n) => {
                self.buf.truncate(start + n);
                if n == 0 {
                    self.eof = true;
                }
                Ok(n > 0)
            }
            Err(err) => {
                self.buf.truncate(start);
                Err(err)
            }
        }
    }

    /// 读取一行（含换行符）；流结束且无剩余数据时返回 `None`。
    async fn read_line(&mut self) -> Result<Option<Vec<u8>>, MultipartError> {
        let mut scanned = 0;
        loop {
            if let Some(offset) = self.buf[scanned..].iter().position(|&b| b == b'\n') {
                let end = scanned + offset + 1;
                return Ok(Some(self.buf.drain(..end).collect()));
            }
            scanned = self.buf.len();
            if scanned > MULTIPART_HEADER_LINE_LIMIT {
                return Err(MultipartError::Malformed("header line too long"));
            }
            if !self.fill().await? {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.buf)));
            }
        }
    }

    /// 跳过前导内容直到第一条边界行。
    async fn skip_preamble(&mut self) -> Result<PartEnd, MultipartError> {
        loop {
            let Some(line) = self.read_line().await? else {
                return Err(MultipartError::BoundaryNotFound);
            };
            let line = trim_line_end(&line);
            if line == self.dash_boundary.as_slice() {
                return Ok(PartEnd::Next);
            }
            if line.len() == self.dash_boundary.len() + 2
                && line.starts_with(&self.dash_boundary)
                && line.ends_with(b"--")
            {
                return Ok(PartEnd::Close);
            }
        }
    }

    /// 读取一个分段的头部块，返回 `Content-Disposition` 的值。
    async fn read_part_headers(&mut self) -> Result<Option<String>, MultipartError> {
        let mut disposition = None;
        for _ in 0..=MAX_PART_HEADERS {
            let Some(line) = self.read_line().await? else {
                return Err(MultipartError::Malformed("unexpected end of part headers"));
            };
            let line = trim_line_end(&line);
            if line.is_empty() {
                return Ok(disposition);
            }
            let text = String::from_utf8_lossy(line);
            if let Some((name, value)) = text.split_once(':')
                && name.trim().eq_ignore_ascii_case("content-disposition")
            {
                disposition = Some(value.trim().to_string());
            }
        }
        Err(MultipartError::Malformed("too many part headers"))
    }

    /// 把当前分段正文写入 `out`，直到下一个分隔符（分隔符本身不写入）。
    async fn copy_part<W>(&mut self, out: &mut W) -> Result<(u64, PartEnd), MultipartError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written: u64 = 0;
        loop {
            let mut search_from = 0;
            let mut keep_from = None;
            while let Some(offset) = find_subslice(&self.buf[search_from..], &self.delimiter) {
                let pos = search_from + offset;
                let after = pos + self.delimiter.len();
                match classify_suffix(&self.buf[after..], self.eof) {
                    Suffix::Accept { consumed, end } => {
                        out.write_all(&self.buf[..pos]).await?;
                        written += pos as u64;
                        self.buf.drain(..after + consumed);
                        out.flush().await?;
                        return Ok((written, end));
                    }
                    Suffix::NeedMore => {
                        keep_from = Some(pos);
                        break;
                    }
                    Suffix::Reject => search_from = pos + 1,
                }
            }

            let flush_to = keep_from.unwrap_or_else(|| {
                self.buf
                    .len()
                    .saturating_sub(self.delimiter.len().saturating_sub(1))
            });
            if flush_to > 0 {
                out.write_all(&self.buf[..flush_to]).await?;
                written += flush_to as u64;
                self.buf.drain(..flush_to);
            }

            // 流结束时若缓冲区以分隔符开头，再判定一次即可收尾
            if !self.fill().await? && keep_from.is_none() {
                return Err(MultipartError::Malformed("unexpected end of body"));
            }
        }
    }

    /// 丢弃剩余请求体（其余分段不处理）。
    async fn drain(&mut self) -> io::Result<u64> {
        self.buf.clear();
        if self.eof {
            return Ok(0);
        }
        tokio::io::copy(&mut self.inner, &mut tokio::io::sink()).await
    }
}

/// 解析请求体并把第一个携带文件的分段写入 `destination`。
///
/// 非文件字段会被跳过；文件写入临时文件，完整读到分隔符后才 rename 到
/// 最终文件名，任何失败都不会在最终文件名下留下半截文件。
pub async fn parse_and_store<R>(
    body: R,
    boundary: &str,
    destination: &Path,
) -> Result<StoredUpload, MultipartError>
where
    R: AsyncRead + Unpin,
{
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return Err(MultipartError::Malformed("invalid boundary"));
    }
    let mut reader = BoundaryReader::new(body, boundary);
    if reader.skip_preamble().await? == PartEnd::Close {
        return Err(MultipartError::MissingFile);
    }

    loop {
        let disposition = reader.read_part_headers().await?;
        let raw_name = disposition
            .as_deref()
            .and_then(disposition_filename)
            .filter(|name| !name.is_empty());

        let Some(raw_name) = raw_name else {
            match reader.copy_part(&mut tokio::io::sink()).await? {
                (_, PartEnd::Next) => continue,
                (_, PartEnd::Close) => return Err(MultipartError::MissingFile),
            }
        };

        let filename = sanitize_filename(&raw_name).ok_or(MultipartError::MissingFile)?;
        check_extension(&filename)?;

        let target = UploadTarget {
            directory: destination.to_path_buf(),
            filename,
        };
        fs::create_dir_all(&target.directory).await?;
        let mut atomic = AtomicFile::new(&target.path()).await?;
        let bytes_written = match reader.copy_part(atomic.file_mut()).await {
            Ok((bytes, _)) => bytes,
            Err(err) => {
                atomic.discard().await;
                return Err(err);
            }
        };
        atomic.commit().await?;

        if let Err(err) = reader.drain().await {
            debug!(error = %err, "remaining multipart body not drained");
        }
        return Ok(StoredUpload {
            target,
            bytes_written,
        });
    }
}

/// 判断 Content-Type 是否为 multipart/form-data。
pub fn is_multipart_form(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|mime| mime.eq_ignore_ascii_case("multipart/form-data"))
}

/// 从 Content-Type 中提取 boundary 参数。
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    if !is_multipart_form(content_type) {
        return None;
    }
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
}

/// 从 `Content-Disposition` 取出原始文件名；`filename*` 优先。
fn disposition_filename(disposition: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;
    let mut rest = disposition.split_once(';')?.1;

    loop {
        rest = rest.trim_start_matches([' ', '\t', ';']);
        let Some((key, tail)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().to_ascii_lowercase();
        let tail = tail.trim_start();
        let (value, remaining) = if let Some(quoted) = tail.strip_prefix('"') {
            match quoted.split_once('"') {
                Some((value, remaining)) => (value, remaining),
                None => (quoted, ""),
            }
        } else {
            match tail.split_once(';') {
                Some((value, remaining)) => (value.trim_end(), remaining),
                None => (tail.trim_end(), ""),
            }
        };
        match key.as_str() {
            "filename" => plain = Some(value.to_string()),
            "filename*" => extended = Some(value.to_string()),
            _ => {}
        }
        rest = remaining;
    }

    extended
        .and_then(|value| {
            // RFC 5987: charset'language'percent-encoded
            let mut pieces = value.splitn(3, '\'');
            let (_charset, _lang, encoded) = (pieces.next()?, pieces.next()?, pieces.next()?);
            Some(encoded.to_string())
        })
        .or(plain)
}

/// 百分号解码后只保留最后一个路径组件。
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw)
        .map(|value| value.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    let base = decoded
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." || base.chars().any(char::is_control) {
        return None;
    }
    Some(base.to_string())
}

/// 扩展名白名单校验（大小写不敏感）。
pub fn check_extension(filename: &str) -> Result<(), MultipartError> {
    let extension = extension_of(filename);
    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(());
    }
    let sample = ALLOWED_EXTENSIONS
        .iter()
        .take(ALLOWED_SAMPLE_LEN)
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(", ");
    Err(MultipartError::ExtensionNotAllowed { extension, sample })
}

fn classify_suffix(bytes: &[u8], eof: bool) -> Suffix {
    let padding = bytes
        .iter()
        .take_while(|&&b| b == b' ' || b == b'\t')
        .count();
    if padding > MAX_TRANSPORT_PADDING {
        return Suffix::Reject;
    }
    let rest = &bytes[padding..];
    if rest.starts_with(b"--") {
        return Suffix::Accept {
            consumed: padding + 2,
            end: PartEnd::Close,
        };
    }
    if rest.starts_with(b"\r\n") {
        return Suffix::Accept {
            consumed: padding + 2,
            end: PartEnd::Next,
        };
    }
    if rest.is_empty() || rest == b"-" || rest == b"\r" {
        if eof {
            return Suffix::Accept {
                consumed: bytes.len(),
                end: PartEnd::Close,
            };
        }
        return Suffix::NeedMore;
    }
    Suffix::Reject
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    let last_start = haystack.len() - needle.len();
    let mut from = 0;
    while from <= last_start {
        let offset = haystack[from..=last_start]
            .iter()
            .position(|&b| b == needle[0])?;
        let at = from + offset;
        if &haystack[at..at + needle.len()] == needle {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|i| i + 1)
        .unwrap_or(0);
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use self::bytes_stream::chunked;
    use tempfile::tempdir;

    const BOUNDARY: &str = "----WebKitFormBoundaryX7a";

    fn file_part(name: &str, filename: &str, content: &[u8]) -> Vec<u8> {
        let mut part = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        part.extend_from_slice(content);
        part.extend_from_slice(b"\r\n");
        part
    }

    fn field_part(name: &str, value: &str) -> Vec<u8> {
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
            .into_bytes()
    }

    fn closing() -> Vec<u8> {
        format!("--{BOUNDARY}--\r\n").into_bytes()
    }

    fn body(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut body: Vec<u8> = parts.concat();
        body.extend_from_slice(&closing());
        body
    }

    fn dir_entries(path: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(path)
            .map(|dir| {
                dir.filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[tokio::test]
    async fn stores_single_file_part() {
        let temp = tempdir().expect("tempdir");
        let payload = body(&[file_part("file", "report.pdf", b"%PDF-1.7 contents")]);

        let stored = parse_and_store(payload.as_slice(), BOUNDARY, temp.path())
            .await
            .expect("parse");
        assert_eq!(stored.target.filename, "report.pdf");
        assert_eq!(stored.bytes_written, 17);
        assert_eq!(
            std::fs::read(temp.path().join("report.pdf")).expect("read"),
            b"%PDF-1.7 contents"
        );
        assert_eq!(dir_entries(temp.path()), ["report.pdf"]);
    }

    #[tokio::test]
    async fn traversal_filename_is_reduced_to_basename() {
        let temp = tempdir().expect("tempdir");
        let destination = temp.path().join("inbox");
        let payload = body(&[file_part("file", "../../evil.sh", b"echo hi")]);

        let stored = parse_and_store(payload.as_slice(), BOUNDARY, &destination)
            .await
            .expect("parse");
        assert_eq!(stored.target.filename, "evil.sh");
        assert_eq!(dir_entries(&destination), ["evil.sh"]);
        assert_eq!(dir_entries(temp.path()), ["inbox"]);
    }

    #[tokio::test]
    async fn windows_style_path_and_percent_encoding_are_sanitized() {
        let temp = tempdir().expect("tempdir");
        let payload = body(&[file_part(
            "file",
            "C:\\Users\\me\\My%20Notes.TXT",
            b"hello",
        )]);

        let stored = parse_and_store(payload.as_slice(), BOUNDARY, temp.path())
            .await
            .expect("parse");
        assert_eq!(stored.target.filename, "My Notes.TXT");
    }

    #[tokio::test]
    async fn disallowed_extension_is_rejected_before_writing() {
        let temp = tempdir().expect("tempdir");
        let destination = temp.path().join("inbox");
        let payload = body(&[file_part("file", "evil.exe", b"MZ")]);

        let result = parse_and_store(payload.as_slice(), BOUNDARY, &destination).await;
        match result {
            Err(MultipartError::ExtensionNotAllowed { extension, sample }) => {
                assert_eq!(extension, "exe");
                assert!(sample.contains(".pdf"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn missing_boundary_is_bad_multipart() {
        let temp = tempdir().expect("tempdir");
        let payload = b"just some text\r\nwithout any delimiter\r\n".to_vec();

        let result = parse_and_store(payload.as_slice(), BOUNDARY, temp.path()).await;
        assert!(matches!(result, Err(MultipartError::BoundaryNotFound)));
    }

    #[tokio::test]
    async fn form_without_file_reports_missing_file() {
        let temp = tempdir().expect("tempdir");
        let payload = body(&[field_part("note", "hello"), file_part("file", "", b"")]);

        let result = parse_and_store(payload.as_slice(), BOUNDARY, temp.path()).await;
        assert!(matches!(result, Err(MultipartError::MissingFile)));
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn leading_fields_are_skipped_and_later_files_ignored() {
        let temp = tempdir().expect("tempdir");
        let payload = body(&[
            field_part("note", "first a field"),
            file_part("file", "a.txt", b"first"),
            file_part("file", "b.txt", b"second"),
        ]);

        let stored = parse_and_store(payload.as_slice(), BOUNDARY, temp.path())
            .await
            .expect("parse");
        assert_eq!(stored.target.filename, "a.txt");
        assert_eq!(dir_entries(temp.path()), ["a.txt"]);
    }

    #[tokio::test]
    async fn content_resembling_boundary_is_preserved() {
        let temp = tempdir().expect("tempdir");
        let content = format!(
            "line one\r\n--{BOUNDARY}X not a delimiter\r\n\r\n--{BOUNDARY}tail\r\n\n\r\n"
        )
        .into_bytes();
        let payload = body(&[file_part("file", "notes.txt", &content)]);

        parse_and_store(payload.as_slice(), BOUNDARY, temp.path())
            .await
            .expect("parse");
        assert_eq!(
            std::fs::read(temp.path().join("notes.txt")).expect("read"),
            content
        );
    }

    #[tokio::test]
    async fn binary_content_survives_tiny_chunks() {
        let temp = tempdir().expect("tempdir");
        let content: Vec<u8> = (0..5000u32)
            .map(|i| match i % 7 {
                0 => b'\r',
                1 => b'\n',
                2 => b'-',
                _ => (i % 251) as u8,
            })
            .collect();
        let payload = body(&[file_part("file", "blob.zip", &content)]);

        for chunk_size in [1, 3, 37, 4096] {
            let destination = temp.path().join(format!("c{chunk_size}"));
            let reader = chunked(&payload, chunk_size);
            let stored = parse_and_store(reader, BOUNDARY, &destination)
                .await
                .expect("parse");
            assert_eq!(stored.bytes_written, content.len() as u64);
            assert_eq!(
                std::fs::read(destination.join("blob.zip")).expect("read"),
                content
            );
        }
    }

    #[tokio::test]
    async fn empty_file_is_stored() {
        let temp = tempdir().expect("tempdir");
        let payload = body(&[file_part("file", "empty.txt", b"")]);

        let stored = parse_and_store(payload.as_slice(), BOUNDARY, temp.path())
            .await
            .expect("parse");
        assert_eq!(stored.bytes_written, 0);
        assert!(temp.path().join("empty.txt").exists());
    }

    #[tokio::test]
    async fn padding_after_delimiter_is_bounded() {
        let temp = tempdir().expect("tempdir");
        let mut content = format!("head\r\n--{BOUNDARY}").into_bytes();
        content.extend_from_slice(&[b' '; MAX_TRANSPORT_PADDING + 1]);
        content.extend_from_slice(b"--tail");
        let payload = body(&[file_part("file", "pad.txt", &content)]);

        let stored = parse_and_store(chunked(&payload, 16), BOUNDARY, temp.path())
            .await
            .expect("parse");
        assert_eq!(stored.bytes_written, content.len() as u64);
        assert_eq!(
            std::fs::read(temp.path().join("pad.txt")).expect("read"),
            content
        );

        assert!(matches!(
            classify_suffix(&[b'\t'; MAX_TRANSPORT_PADDING + 1], false),
            Suffix::Reject
        ));
        assert!(matches!(
            classify_suffix(&[b' '; MAX_TRANSPORT_PADDING], false),
            Suffix::NeedMore
        ));
    }

    #[tokio::test]
    async fn truncated_body_leaves_no_file() {
        let temp = tempdir().expect("tempdir");
        let mut payload = file_part("file", "movie.mp4", b"");
        payload.extend_from_slice(&[7u8; 10_000]);

        let result = parse_and_store(payload.as_slice(), BOUNDARY, temp.path()).await;
        assert!(matches!(result, Err(MultipartError::Malformed(_))));
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn extended_filename_parameter_wins() {
        let temp = tempdir().expect("tempdir");
        let payload = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"fallback.txt\"; filename*=UTF-8''na%C3%AFve.txt\r\n\r\ndata\r\n--{BOUNDARY}--\r\n"
        )
        .into_bytes();

        let stored = parse_and_store(payload.as_slice(), BOUNDARY, temp.path())
            .await
            .expect("parse");
        assert_eq!(stored.target.filename, "naïve.txt");
    }

    #[test]
    fn boundary_is_read_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=abc123").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            boundary_from_content_type("Multipart/Form-Data; charset=utf-8; boundary=\"q r\"")
                .as_deref(),
            Some("q r")
        );
        assert_eq!(boundary_from_content_type("multipart/form-data"), None);
        assert_eq!(boundary_from_content_type("application/json"), None);
        assert!(!is_multipart_form("text/plain"));
    }

    #[test]
    fn sanitize_rejects_empty_and_dot_names() {
        assert_eq!(sanitize_filename("a/b/"), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("%2e%2e"), None);
        assert_eq!(sanitize_filename("..%2F..%2Fx.md").as_deref(), Some("x.md"));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(check_extension("photo.JPG").is_ok());
        assert!(check_extension("archive.tar.gz").is_ok());
        assert!(check_extension("Makefile").is_err());
        assert!(check_extension("setup.msi").is_err());
    }

    mod bytes_stream {
        use std::pin::Pin;
        use std::task::{Context, Poll};
        use tokio::io::{AsyncRead, ReadBuf};

        /// 每次最多交出 `chunk` 字节的读取器，用于覆盖分隔符跨块的情形。
        pub struct Chunked {
            data: Vec<u8>,
            pos: usize,
            chunk: usize,
        }

        pub fn chunked(data: &[u8], chunk: usize) -> Chunked {
            Chunked {
                data: data.to_vec(),
                pos: 0,
                chunk,
            }
        }

        impl AsyncRead for Chunked {
            fn poll_read(
                mut self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                buf: &mut ReadBuf<'_>,
            ) -> Poll<std::io::Result<()>> {
                let end = (self.pos + self.chunk)
                    .min(self.data.len())
                    .min(self.pos + buf.remaining());
                let start = self.pos;
                buf.put_slice(&self.data[start..end]);
                self.pos = end;
                Poll::Ready(Ok(()))
            }
        }
    }
}
