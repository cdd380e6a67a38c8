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

//! Server-side scripts. Every multi-key mutation is one EVAL so readers
//! never observe a record whose index memberships disagree with its stored
//! terms.
//!
//! Key layout:
//!   id:<path>        string  id for the import path
//!   pkg:<id>         hash    path, synopsis, rank, terms, imports, etag, blob
//!   index:<term>     set     ids for an (encoded) search term
//!   crawl            zset    id scored by unix time of last crawl
//!   block            set     blocked import-path prefixes
//!   maxPackageId     string  id allocator
//!   maxQueryId       string  temp-key allocator for queries

/// ARGV: path, synopsis, rank, blob, terms, imports, etag, crawl.
/// Diffs the stored term set against the new one and fixes index
/// memberships in the same transaction as the record write.
pub const PUT: &str = r#"
local path = ARGV[1]
local synopsis = ARGV[2]
local rank = ARGV[3]
local blob = ARGV[4]
local terms = ARGV[5]
local imports = ARGV[6]
local etag = ARGV[7]
local crawl = ARGV[8]

local id = redis.call('GET', 'id:' .. path)
if not id then
    id = redis.call('INCR', 'maxPackageId')
    redis.call('SET', 'id:' .. path, id)
end

local update = {}
for term in string.gmatch(redis.call('HGET', 'pkg:' .. id, 'terms') or '', '([^ ]+)') do
    update[term] = 1
end

for term in string.gmatch(terms, '([^ ]+)') do
    update[term] = (update[term] or 0) + 2
end

for term, x in pairs(update) do
    if x == 1 then
        redis.call('SREM', 'index:' .. term, id)
    elseif x == 2 then
        redis.call('SADD', 'index:' .. term, id)
    end
end

local c = redis.call('ZSCORE', 'crawl', id)
if not c or tonumber(c) < tonumber(crawl) then
    redis.call('ZADD', 'crawl', crawl, id)
end

return redis.call('HMSET', 'pkg:' .. id, 'path', path, 'synopsis', synopsis, 'rank', rank, 'blob', blob, 'terms', terms, 'imports', imports, 'etag', etag)
"#;

/// ARGV: project set key, path, etag, crawl. Advances the crawl time for the
/// path and for every project sibling whose stored ETag matches, so one head
/// revision freshens the whole project.
pub const TOUCH: &str = r#"
local id = redis.call('GET', 'id:' .. ARGV[2])
if id then
    redis.call('ZADD', 'crawl', ARGV[4], id)
end

local pkgs = redis.call('SORT', ARGV[1], 'BY', 'nosort', 'GET', '#', 'GET', 'pkg:*->etag')
for i = 1, #pkgs, 2 do
    if pkgs[i + 1] == ARGV[3] and pkgs[i] ~= id then
        redis.call('ZADD', 'crawl', ARGV[4], pkgs[i])
    end
end
return true
"#;

/// ARGV: path. `-` selects the least recently crawled record. Returns
/// `{blob, crawl}` or false.
pub const GET_DOC: &str = r#"
local path = ARGV[1]

local id
if path == '-' then
    local r = redis.call('ZRANGE', 'crawl', 0, 0)
    if not r or #r == 0 then
        return false
    end
    id = r[1]
else
    id = redis.call('GET', 'id:' .. path)
    if not id then
        return false
    end
end

local blob = redis.call('HGET', 'pkg:' .. id, 'blob')
if not blob then
    return false
end

local crawl = redis.call('ZSCORE', 'crawl', id)
if not crawl then
    crawl = 0
end

return {blob, crawl}
"#;

/// ARGV: path. Removes index memberships, the crawl entry and the record.
pub const DELETE: &str = r#"
local path = ARGV[1]

local id = redis.call('GET', 'id:' .. path)
if not id then
    return false
end

for term in string.gmatch(redis.call('HGET', 'pkg:' .. id, 'terms') or '', '([^ ]+)') do
    redis.call('SREM', 'index:' .. term, id)
end

redis.call('ZREM', 'crawl', id)
redis.call('DEL', 'pkg:' .. id)
return redis.call('DEL', 'id:' .. path)
"#;

/// ARGV: candidate project set keys, most specific first. The first
/// non-empty set wins.
pub const SUBDIRS: &str = r#"
local reply
for i = 1, #ARGV do
    reply = redis.call('SORT', ARGV[i], 'ALPHA', 'BY', 'pkg:*->path', 'GET', 'pkg:*->path', 'GET', 'pkg:*->synopsis')
    if #reply > 0 then
        break
    end
end
return reply
"#;

/// ARGV: paths. Projects each to `path, synopsis`, empty synopsis for
/// unknown paths.
pub const PACKAGES: &str = r#"
local result = {}
for i = 1, #ARGV do
    local path = ARGV[i]
    local synopsis = ''
    local id = redis.call('GET', 'id:' .. path)
    if id then
        synopsis = redis.call('HGET', 'pkg:' .. id, 'synopsis') or ''
    end
    result[#result + 1] = path
    result[#result + 1] = synopsis
end
return result
"#;

/// ARGV: temp key, then the index set keys to intersect. Returns
/// `id, path, synopsis, rank` tuples in ascending id order; callers sort by
/// rank with the id as the stable tie-break.
pub const QUERY: &str = r#"
redis.call('SINTERSTORE', ARGV[1], unpack(ARGV, 2))
local r = redis.call('SORT', ARGV[1], 'GET', '#', 'GET', 'pkg:*->path', 'GET', 'pkg:*->synopsis', 'GET', 'pkg:*->rank')
redis.call('DEL', ARGV[1])
return r
"#;

/// ARGV: path. Returns `{synopsis, imports}` for the import-graph walk.
pub const GRAPH_NODE: &str = r#"
local id = redis.call('GET', 'id:' .. ARGV[1])
if not id then
    return false
end
return redis.call('HMGET', 'pkg:' .. id, 'synopsis', 'imports')
"#;

/// ARGV: every prefix of a path that ends at a `/` boundary.
pub const IS_BLOCKED: &str = r#"
for i = 1, #ARGV do
    if redis.call('SISMEMBER', 'block', ARGV[i]) == 1 then
        return 1
    end
end
return 0
"#;
