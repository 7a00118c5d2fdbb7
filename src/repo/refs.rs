//! Branch listing through gix.
//!
//! Reading refs does not need the git binary; packed and loose refs are
//! both covered by `references()`.

use std::path::Path;

use super::RepoError;

/// Short names of local branches (`refs/heads/*`).
pub fn local_branches(root: &Path) -> Result<Vec<String>, RepoError> {
    let repo = gix::open(root).map_err(|e| RepoError::refs(root, e))?;
    let platform = repo.references().map_err(|e| RepoError::refs(root, e))?;

    let mut names = Vec::new();
    for reference in platform
        .local_branches()
        .map_err(|e| RepoError::refs(root, e))?
    {
        let reference = reference.map_err(|e| RepoError::refs(root, e))?;
        names.push(reference.name().shorten().to_string());
    }
    names.sort();
    Ok(names)
}

/// Branch names offered by `remote`, without the remote prefix and
/// without the symbolic `HEAD`.
pub fn remote_branches(root: &Path, remote: &str) -> Result<Vec<String>, RepoError> {
    let repo = gix::open(root).map_err(|e| RepoError::refs(root, e))?;
    let platform = repo.references().map_err(|e| RepoError::refs(root, e))?;
    let prefix = format!("{remote}/");

    let mut names = Vec::new();
    for reference in platform
        .remote_branches()
        .map_err(|e| RepoError::refs(root, e))?
    {
        let reference = reference.map_err(|e| RepoError::refs(root, e))?;
        let short = reference.name().shorten().to_string();
        if let Some(branch) = short.strip_prefix(&prefix)
            && branch != "HEAD"
        {
            names.push(branch.to_string());
        }
    }
    names.sort();
    Ok(names)
}
