use nanoid::nanoid;

// ==========================================
// ID 生成工具 (Identity Utilities)
// ==========================================

/// 实体 ID 字符集
///
/// 不含 `-` 和 `_`，方便双击选中与 URL 拼接。
const ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

/// 生成成员/案件的唯一 ID (NanoID)
///
/// 使用 NanoID 替换 UUID: 更短、URL 友好、生成更快。
#[inline]
pub fn new_entity_id() -> String {
    nanoid!(12, &ALPHABET)
}

/// 生成默认的运行节点标识
///
/// 形如 `hostname-a1b2c`，主机名获取失败时退化为纯随机串。
pub fn default_runner_id() -> String {
    let host = hostname::get()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "runner".to_string());

    format!("{}-{}", host, nanoid!(5, &ALPHABET))
}
