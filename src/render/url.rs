//! Preview URLs for rendered content files.

use std::path::Path;

/// URL of the generated document for a content file.
///
/// `project` is the render root relative to the workspace. The file's
/// extension is replaced by `extension`, or appended if it has none.
/// Empty segments are dropped, so the URL never contains `//`.
///
/// ```ignore
/// output_url("docs", "guide", "intro.md", "html") == "/docs/guide/intro.html"
/// ```
pub fn output_url(project: &str, directory: &str, filename: &str, extension: &str) -> String {
    let document = Path::new(filename).with_extension(extension);
    let document = document.to_string_lossy();

    let mut url = String::new();
    for segment in project
        .split('/')
        .chain(directory.split('/'))
        .chain(document.split('/'))
        .filter(|s| !s.is_empty())
    {
        url.push('/');
        url.push_str(segment);
    }
    if url.is_empty() {
        url.push('/');
    }
    url
}
