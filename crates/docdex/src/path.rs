// Copyright 2025 Docdex Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Import path validation.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static VALID_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-A-Za-z0-9]+(?:\.[-A-Za-z0-9]+)+").unwrap());

// Generic TLDs plus the country codes that actually show up in import paths.
// A host whose last dotted label is not in this set is rejected outright.
static VALID_TLDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ac", "ad", "ae", "aero", "af", "ag", "ai", "al", "am", "ar", "arpa", "as", "asia", "at",
        "au", "az", "ba", "be", "bg", "bh", "bi", "biz", "bj", "bo", "br", "bs", "by", "bz", "ca",
        "cat", "cc", "cd", "ch", "cl", "cm", "cn", "co", "com", "coop", "cr", "cu", "cx", "cy",
        "cz", "de", "dev", "dj", "dk", "do", "dz", "ec", "edu", "ee", "eg", "es", "eu", "fi",
        "fm", "fo", "fr", "ga", "gd", "ge", "gg", "gh", "gi", "gl", "gov", "gr", "gs", "gt", "gy",
        "hk", "hm", "hn", "hr", "ht", "hu", "id", "ie", "il", "im", "in", "info", "int", "io",
        "iq", "ir", "is", "it", "je", "jm", "jo", "jobs", "jp", "ke", "kg", "kh", "ki", "kr",
        "kw", "ky", "kz", "la", "lb", "li", "lk", "lt", "lu", "lv", "ly", "ma", "mc", "md", "me",
        "mg", "mil", "mk", "mn", "mobi", "ms", "mt", "mu", "museum", "mx", "my", "name", "net",
        "nf", "ng", "ni", "nl", "no", "np", "nu", "nz", "om", "org", "pa", "pe", "ph", "pk",
        "pl", "pm", "pn", "post", "pr", "pro", "ps", "pt", "pw", "py", "qa", "re", "ro", "rs",
        "ru", "rw", "sa", "sb", "sc", "sd", "se", "sg", "sh", "si", "sk", "sl", "sm", "sn", "so",
        "sr", "st", "su", "sv", "sy", "sz", "tc", "td", "tel", "tf", "tg", "th", "tj", "tk",
        "tl", "tm", "tn", "to", "tr", "travel", "tt", "tv", "tw", "tz", "ua", "ug", "uk", "us",
        "uy", "uz", "va", "vc", "ve", "vg", "vi", "vn", "vu", "ws", "za", "zm", "zw",
    ]
    .into_iter()
    .collect()
});

// Standard-library import paths. Resolved against the upstream source tree
// rather than through the service dispatcher.
static STANDARD_PACKAGES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "archive/tar",
        "archive/zip",
        "bufio",
        "builtin",
        "bytes",
        "compress/bzip2",
        "compress/flate",
        "compress/gzip",
        "compress/lzw",
        "compress/zlib",
        "container/heap",
        "container/list",
        "container/ring",
        "crypto",
        "crypto/aes",
        "crypto/cipher",
        "crypto/des",
        "crypto/dsa",
        "crypto/ecdsa",
        "crypto/elliptic",
        "crypto/hmac",
        "crypto/md5",
        "crypto/rand",
        "crypto/rc4",
        "crypto/rsa",
        "crypto/sha1",
        "crypto/sha256",
        "crypto/sha512",
        "crypto/subtle",
        "crypto/tls",
        "crypto/x509",
        "crypto/x509/pkix",
        "database/sql",
        "database/sql/driver",
        "debug/dwarf",
        "debug/elf",
        "debug/gosym",
        "debug/macho",
        "debug/pe",
        "encoding/ascii85",
        "encoding/asn1",
        "encoding/base32",
        "encoding/base64",
        "encoding/binary",
        "encoding/csv",
        "encoding/gob",
        "encoding/hex",
        "encoding/json",
        "encoding/pem",
        "encoding/xml",
        "errors",
        "expvar",
        "flag",
        "fmt",
        "go/ast",
        "go/build",
        "go/doc",
        "go/format",
        "go/parser",
        "go/printer",
        "go/scanner",
        "go/token",
        "hash",
        "hash/adler32",
        "hash/crc32",
        "hash/crc64",
        "hash/fnv",
        "html",
        "html/template",
        "image",
        "image/color",
        "image/draw",
        "image/gif",
        "image/jpeg",
        "image/png",
        "index/suffixarray",
        "io",
        "io/ioutil",
        "log",
        "log/syslog",
        "math",
        "math/big",
        "math/cmplx",
        "math/rand",
        "mime",
        "mime/multipart",
        "net",
        "net/http",
        "net/http/cgi",
        "net/http/cookiejar",
        "net/http/fcgi",
        "net/http/httptest",
        "net/http/httputil",
        "net/http/pprof",
        "net/mail",
        "net/rpc",
        "net/rpc/jsonrpc",
        "net/smtp",
        "net/textproto",
        "net/url",
        "os",
        "os/exec",
        "os/signal",
        "os/user",
        "path",
        "path/filepath",
        "reflect",
        "regexp",
        "regexp/syntax",
        "runtime",
        "runtime/cgo",
        "runtime/debug",
        "runtime/pprof",
        "sort",
        "strconv",
        "strings",
        "sync",
        "sync/atomic",
        "syscall",
        "testing",
        "testing/iotest",
        "testing/quick",
        "text/scanner",
        "text/tabwriter",
        "text/template",
        "text/template/parse",
        "time",
        "unicode",
        "unicode/utf16",
        "unicode/utf8",
        "unsafe",
    ]
    .into_iter()
    .collect()
});

/// Reports whether the path names a standard-library package.
pub fn is_standard_package(path: &str) -> bool {
    STANDARD_PACKAGES.contains(path)
}

pub fn standard_packages() -> impl Iterator<Item = &'static str> {
    STANDARD_PACKAGES.iter().copied()
}

fn last_label(host: &str) -> Option<&str> {
    host.rsplit('.').next().filter(|l| *l != host)
}

/// Reports whether the import path is syntactically a remote module path:
/// printable characters only, a real-looking host with a recognized TLD, and
/// no reserved segments.
pub fn is_valid_remote_path(import_path: &str) -> bool {
    for r in import_path.chars() {
        if r == char::REPLACEMENT_CHARACTER
            || r < ' '
            || r == '\u{7f}'
            || r == '\\'
            || r.is_whitespace()
            || "!\"#$%&'()*,:;<=>?[]^`{|}".contains(r)
        {
            return false;
        }
    }

    let mut parts = import_path.split('/');
    let host = match parts.next() {
        Some(h) if !h.is_empty() => h,
        _ => return false,
    };
    match last_label(host) {
        Some(tld) if VALID_TLDS.contains(tld) => {}
        _ => return false,
    }
    if !VALID_HOST.is_match(host) {
        return false;
    }

    for part in parts {
        if part.is_empty() || part.starts_with('.') || part.starts_with('_') || part == "testdata"
        {
            return false;
        }
    }

    // Reject mirrors of the standard source tree.
    if let Some(i) = import_path.find("/src/pkg/") {
        if i > 0 && is_standard_package(&import_path[i + "/src/pkg/".len()..]) {
            return false;
        }
    }

    true
}

static BROWSE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^https?://(github\.com/[^/]+/[^/]+)(?:/tree/[^/]+(/.*)?)?/?$").unwrap(),
        Regex::new(r"^https?://(bitbucket\.org/[^/]+/[^/]+)(?:/src(?:/[0-9a-z]+(/[^?]*)?)?)?/?(?:\?.*)?$")
            .unwrap(),
    ]
});

/// Maps a repository browse URL typed into the search box to the import path
/// it documents.
pub fn is_browse_url(s: &str) -> Option<String> {
    for re in BROWSE_PATTERNS.iter() {
        if let Some(caps) = re.captures(s) {
            let mut path = caps.get(1).map(|m| m.as_str().to_string())?;
            if let Some(dir) = caps.get(2) {
                path.push_str(dir.as_str().trim_end_matches('/'));
            }
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn good_remote_paths() {
        for p in [
            "github.com/user/repo",
            "camlistore.org",
            "example.org",
            "github.com/user/repo/src/pkg/compress/somethingelse",
            "github.com/user/repo/src/compress/gzip",
            "github.com/user/repo/src/pkg",
        ] {
            assert!(is_valid_remote_path(p), "expected valid: {}", p);
        }
    }

    #[test]
    fn bad_remote_paths() {
        for p in [
            "foobar",
            "foo.",
            ".bar",
            "favicon.ico",
            "github.com/user/repo/testdata/x",
            "github.com/user/repo/_ignore/x",
            "github.com/user/repo/.ignore/x",
            "github.com/user/repo/src/pkg/compress/gzip",
            "github.com/user repo",
            "github.com/user\\repo",
            "github.com/user/repo//x",
        ] {
            assert!(!is_valid_remote_path(p), "expected invalid: {}", p);
        }
    }

    #[test]
    fn standard_packages_present() {
        assert!(is_standard_package("encoding/json"));
        assert!(is_standard_package("net/http"));
        assert!(!is_standard_package("github.com/user/repo"));
    }

    #[test]
    fn browse_urls() {
        let cases = [
            (
                "https://bitbucket.org/user/repo/src/bd0b661a263e/p1/p2?at=default",
                "bitbucket.org/user/repo/p1/p2",
            ),
            ("https://bitbucket.org/user/repo/src", "bitbucket.org/user/repo"),
            ("https://bitbucket.org/user/repo", "bitbucket.org/user/repo"),
            ("https://github.com/user/repo", "github.com/user/repo"),
            (
                "https://github.com/user/repo/tree/master/p1",
                "github.com/user/repo/p1",
            ),
        ];
        for (url, want) in cases {
            assert_eq!(is_browse_url(url).as_deref(), Some(want), "url: {}", url);
        }
        assert_eq!(is_browse_url("https://example.com/x"), None);
    }
}
