pub(crate) struct FieldSpec {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub values: &'static [(&'static str, &'static str, &'static str)],
}

// Order is the serialization order: entry N is position N + 1.
pub(crate) static STANDARD_FIELDS: [FieldSpec; 16] = [
    FieldSpec {
        name: "macroPeriod",
        display_name: "宏周期",
        description: "用于描述数据的宏观时间周期",
        values: &[
            ("0", "none", "无"),
            ("1", "annually", "年"),
            ("2", "monthly", "月"),
            ("3", "daily", "日"),
            ("4", "hourly", "时"),
        ],
    },
    FieldSpec {
        name: "aggregate",
        display_name: "聚合",
        description: "数据聚合方式",
        values: &[
            ("0", "none", "无"),
            ("1", "maximum", "最大值"),
            ("2", "minimum", "最小值"),
            ("3", "average", "平均值"),
            ("4", "sum", "总和"),
        ],
    },
    FieldSpec {
        name: "measurePeriod",
        display_name: "测量周期",
        description: "测量数据的时间间隔",
        values: &[
            ("0", "none", "无"),
            ("1", "second", "秒"),
            ("2", "minute", "分钟"),
            ("3", "hour", "小时"),
            ("4", "day", "天"),
        ],
    },
    FieldSpec {
        name: "accumulationBehaviour",
        display_name: "累积行为",
        description: "数据的累积特性",
        values: &[
            ("0", "none", "无"),
            ("1", "accumulating", "累积"),
            ("2", "delta", "差值"),
            ("3", "instantaneous", "瞬时"),
        ],
    },
    FieldSpec {
        name: "flowDirection",
        display_name: "流向",
        description: "能量流动方向",
        values: &[
            ("0", "none", "无"),
            ("1", "forward", "正向"),
            ("2", "reverse", "反向"),
            ("3", "net", "净值"),
            ("19", "total", "全部"),
        ],
    },
    FieldSpec {
        name: "commodity",
        display_name: "商品",
        description: "测量的商品类型",
        values: &[
            ("0", "none", "无"),
            ("1", "electricity", "电能"),
            ("2", "gas", "燃气"),
            ("3", "water", "水"),
            ("4", "time", "时间"),
        ],
    },
    FieldSpec {
        name: "measurementKind",
        display_name: "测量类型",
        description: "具体的测量种类",
        values: &[
            ("0", "none", "无"),
            ("12", "current", "电流"),
            ("13", "voltage", "电压"),
            ("37", "power", "功率"),
            ("38", "energy", "电能"),
        ],
    },
    FieldSpec {
        name: "harmonic",
        display_name: "谐波",
        description: "谐波特性",
        values: &[
            ("0", "none", "无"),
            ("1", "fundamental", "基波"),
            ("2", "harmonic", "谐波"),
        ],
    },
    FieldSpec {
        name: "argumentNumerator",
        display_name: "参数分子",
        description: "参数的分子部分",
        values: &[
            ("0", "none", "无"),
            ("1", "A-phase", "A相"),
            ("2", "B-phase", "B相"),
            ("3", "C-phase", "C相"),
        ],
    },
    FieldSpec {
        name: "TOU",
        display_name: "分时",
        description: "分时电价时段",
        values: &[
            ("0", "none", "无"),
            ("1", "peak", "峰时"),
            ("2", "flat", "平时"),
            ("3", "valley", "谷时"),
        ],
    },
    FieldSpec {
        name: "cpp",
        display_name: "关键峰值价格",
        description: "关键峰值价格标识",
        values: &[("0", "none", "无")],
    },
    FieldSpec {
        name: "tier",
        display_name: "阶梯",
        description: "阶梯电价级别",
        values: &[
            ("0", "none", "无"),
            ("1", "tier1", "第一阶梯"),
            ("2", "tier2", "第二阶梯"),
            ("3", "tier3", "第三阶梯"),
        ],
    },
    FieldSpec {
        name: "phase",
        display_name: "相位",
        description: "电气相位",
        values: &[
            ("0", "none", "无"),
            ("1", "A-phase", "A相"),
            ("2", "B-phase", "B相"),
            ("3", "C-phase", "C相"),
            ("64", "three-phase", "三相"),
        ],
    },
    FieldSpec {
        name: "multiplier",
        display_name: "乘数",
        description: "数值乘数",
        values: &[
            ("0", "1", "1"),
            ("3", "1000", "1000"),
            ("6", "1000000", "1000000"),
        ],
    },
    FieldSpec {
        name: "uom",
        display_name: "单位",
        description: "测量单位",
        values: &[
            ("0", "none", "无"),
            ("5", "ampere", "安培(A)"),
            ("29", "volt", "伏特(V)"),
            ("38", "watt", "瓦特(W)"),
            ("72", "watthour", "瓦时(Wh)"),
        ],
    },
    FieldSpec {
        name: "currency",
        display_name: "货币",
        description: "货币代码",
        values: &[
            ("0", "none", "无"),
            ("978", "EUR", "欧元"),
            ("156", "CNY", "人民币"),
        ],
    },
];
