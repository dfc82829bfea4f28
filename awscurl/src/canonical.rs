use awscurl_aws_v4::AWS_QUERY_ENCODE_SET;
use awscurl_core::{Error, Result};
use percent_encoding::utf8_percent_encode;
use url::Url;

/// Rebuild the query of `raw` from its decoded pairs.
///
/// Every name and value is decoded and encoded again with the unreserved set,
/// so however the caller typed the query, the result is the form that gets
/// signed and sent. Pair order is preserved. Encoding is idempotent: passing
/// the result through `canonicalize` again yields the same url.
///
/// A url without query pairs ends up without `?`. The fragment is dropped
/// since it is never sent.
pub fn canonicalize(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| {
        Error::request_invalid(format!("invalid url '{raw}'")).with_source(e)
    })?;

    let query = url
        .query_pairs()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(&k, &AWS_QUERY_ENCODE_SET),
                utf8_percent_encode(&v, &AWS_QUERY_ENCODE_SET)
            )
        })
        .collect::<Vec<_>>()
        .join("&");

    url.set_fragment(None);
    if query.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&query));
    }

    Ok(url)
}
