/// 树形文档合并算法
///
/// plist 与 JSON 文档共享同一套递归合并，由 [`MergePolicy`] 决定数组与字典的处理方式：
///
/// | 策略 | 已有数组 | 已有字典 |
/// |------|----------|----------|
/// | `Overwrite` | 新值整体替换 | 新值整体替换 |
/// | `Union` | 去重拼接 | 递归合并 |
/// | `Update { replace }` | `replace` 或元素为容器时替换，否则去重拼接 | `replace` 时替换，否则递归合并 |
///
/// 标量总是被新值覆盖，补丁中不存在的键保持不变。

/// 合并策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// plist `set`：数组和字典由新值整体覆盖
    Overwrite,
    /// plist `merge`：数组去重拼接，字典递归合并
    Union,
    /// plist `update`：兼容旧行为的第三种算法
    Update { replace: bool },
}

/// 可参与合并的树节点
pub trait MergeValue: Clone + PartialEq + Sized {
    /// 若为数组返回元素
    fn as_array(&self) -> Option<&[Self]>;

    /// 是否为非空字典节点
    fn is_object(&self) -> bool;

    fn from_array(items: Vec<Self>) -> Self;

    /// 字典中键对应的可变子节点
    fn entry_mut(&mut self, key: &str) -> Option<&mut Self>;

    /// 向字典插入（或追加）键值
    fn insert_entry(&mut self, key: String, value: Self);

    /// 拆分字典为有序键值对；非字典返回 None
    fn into_entries(self) -> Option<Vec<(String, Self)>>;

    /// 数组或字典
    fn is_container(&self) -> bool {
        self.as_array().is_some() || self.is_object()
    }
}

/// 将 `patch` 合并进 `target`
///
/// 两者均为字典时逐键合并；否则 `patch` 直接替换 `target`
pub fn merge_into<V: MergeValue>(target: &mut V, patch: V, policy: MergePolicy) {
    if !target.is_object() || !patch.is_object() {
        *target = patch;
        return;
    }
    merge_entries(target, patch, policy);
}

fn merge_entries<V: MergeValue>(target: &mut V, patch: V, policy: MergePolicy) {
    let Some(entries) = patch.into_entries() else {
        return;
    };

    for (key, incoming) in entries {
        match target.entry_mut(&key) {
            Some(existing) => merge_value(existing, incoming, policy),
            None => target.insert_entry(key, incoming),
        }
    }
}

fn merge_value<V: MergeValue>(existing: &mut V, incoming: V, policy: MergePolicy) {
    match policy {
        MergePolicy::Overwrite => *existing = incoming,
        MergePolicy::Union => {
            if existing.as_array().is_some() && incoming.as_array().is_some() {
                *existing = union(existing, &incoming);
            } else if existing.is_object() && incoming.is_object() {
                merge_entries(existing, incoming, policy);
            } else {
                *existing = incoming;
            }
        }
        MergePolicy::Update { replace } => {
            if let (Some(current), Some(new)) = (existing.as_array(), incoming.as_array()) {
                let holds_containers = current.first().is_some_and(V::is_container)
                    || new.first().is_some_and(V::is_container);
                if replace || holds_containers {
                    *existing = incoming;
                } else {
                    *existing = union(existing, &incoming);
                }
            } else if existing.is_object() && incoming.is_object() && !replace {
                merge_entries(existing, incoming, policy);
            } else {
                *existing = incoming;
            }
        }
    }
}

/// 去重拼接，保持首次出现的顺序
fn union<V: MergeValue>(left: &V, right: &V) -> V {
    let mut items: Vec<V> = Vec::new();
    let all = left
        .as_array()
        .unwrap_or_default()
        .iter()
        .chain(right.as_array().unwrap_or_default());
    for item in all {
        if !items.contains(item) {
            items.push(item.clone());
        }
    }
    V::from_array(items)
}
