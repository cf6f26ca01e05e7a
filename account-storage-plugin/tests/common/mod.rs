//! 共享测试工具和辅助函数

#![allow(dead_code)]

use account_storage_plugin::{Value, ValueType};

/// Values that exercise every escaping rule, grouped by type.
pub fn sample_values() -> Vec<(ValueType, Vec<Value>)> {
    vec![
        (
            ValueType::String,
            vec![
                Value::from(""),
                Value::from("plain"),
                Value::from("  leading spaces"),
                Value::from("trailing spaces  "),
                Value::from("tabs\tand\nnewlines\r"),
                Value::from("back\\slash"),
                Value::from("semi;colon"),
                Value::from("ünïcödé ☃"),
            ],
        ),
        (
            ValueType::Boolean,
            vec![Value::Boolean(true), Value::Boolean(false)],
        ),
        (
            ValueType::Int32,
            vec![Value::Int32(0), Value::Int32(i32::MIN), Value::Int32(i32::MAX)],
        ),
        (
            ValueType::UInt32,
            vec![Value::UInt32(0), Value::UInt32(u32::MAX)],
        ),
        (
            ValueType::Int64,
            vec![Value::Int64(i64::MIN), Value::Int64(-1), Value::Int64(i64::MAX)],
        ),
        (
            ValueType::UInt64,
            vec![Value::UInt64(0), Value::UInt64(u64::MAX)],
        ),
        (ValueType::Byte, vec![Value::Byte(0), Value::Byte(255)]),
        (
            ValueType::StringArray,
            vec![
                Value::StringArray(vec![]),
                Value::StringArray(vec![String::new()]),
                Value::StringArray(vec!["a".into(), String::new(), "b".into()]),
                Value::StringArray(vec!["x;y".into(), " z".into(), "back\\".into()]),
            ],
        ),
        (
            ValueType::ObjectPath,
            vec![
                Value::ObjectPath("/".into()),
                Value::ObjectPath("/org/freedesktop/Telepathy/Account/a/b/c0".into()),
            ],
        ),
        (
            ValueType::ObjectPathArray,
            vec![
                Value::ObjectPathArray(vec![]),
                Value::ObjectPathArray(vec!["/a".into(), "/a/b_c".into()]),
            ],
        ),
    ]
}
