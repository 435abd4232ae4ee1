/// Extension used for operations missing from [`EXTENSIONS`].
pub const DEFAULT_EXTENSION: &str = "pdf";

const PROCESSED_SUFFIX: &str = "-processed";

const EXTENSIONS: &[(&str, &str)] = &[
    ("compress", "pdf"),
    ("merge", "pdf"),
    ("rotate", "pdf"),
    ("protect", "pdf"),
    ("unlock", "pdf"),
    ("watermark", "pdf"),
    ("toPdf", "pdf"),
    ("imageToPdf", "pdf"),
    ("wordToPdf", "pdf"),
    ("split", "zip"),
    ("pdfToImages", "zip"),
    ("toCsv", "csv"),
    ("toExcel", "xlsx"),
    ("toWord", "docx"),
    ("toJson", "json"),
    ("toText", "txt"),
    ("toPng", "png"),
    ("toJpg", "jpg"),
    ("toWebp", "webp"),
    ("removeBackground", "png"),
    ("toMp3", "mp3"),
    ("toMp4", "mp4"),
    ("toGif", "gif"),
];

/// Output extension for `operation`; never fails.
pub fn extension_for(operation: &str) -> &'static str {
    EXTENSIONS
        .iter()
        .find(|(op, _)| *op == operation)
        .map(|(_, ext)| *ext)
        .unwrap_or(DEFAULT_EXTENSION)
}

/// `{stem}-processed.{ext}` where `stem` is `input_name` minus its last extension.
pub fn derive_output_filename(input_name: &str, operation: &str) -> String {
    let stem = strip_extension(input_name);
    let stem = if stem.is_empty() { "file" } else { stem };
    format!("{stem}{PROCESSED_SUFFIX}.{}", extension_for(operation))
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        // A leading dot marks a hidden file, not an extension.
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}
