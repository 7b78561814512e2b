// src/sample_data/exercises.rs - Exercise METs knowledge base
//
// METs values follow the Compendium of Physical Activities and the
// Chinese adult physical-activity energy expenditure reference.

use crate::rag::types::ExerciseKnowledge;

fn exercise(
    name: &str,
    aliases: &[&str],
    category: &str,
    mets: f64,
    intensity: &str,
    description: &str,
) -> ExerciseKnowledge {
    ExerciseKnowledge {
        exercise_name: name.to_string(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        category: category.to_string(),
        mets,
        intensity: intensity.to_string(),
        description: description.to_string(),
    }
}

pub fn builtin_exercises() -> Vec<ExerciseKnowledge> {
    vec![
        exercise("walking", &["步行", "散步", "走路"], "步行类", 3.5, "light", "普通速度步行（约4-5km/h）"),
        exercise("brisk_walking", &["快走", "健走"], "步行类", 4.3, "moderate", "快速步行（约5.5-6.5km/h）"),
        exercise("hiking", &["徒步", "登山", "爬山"], "步行类", 5.3, "moderate", "野外徒步、登山"),
        exercise("stair_climbing", &["爬楼梯", "登楼"], "步行类", 8.0, "vigorous", "爬楼梯运动"),
        exercise("running", &["跑步"], "跑步类", 8.0, "vigorous", "中等速度跑步（约8km/h）"),
        exercise("jogging", &["慢跑"], "跑步类", 7.0, "moderate", "轻松慢跑（约6-7km/h）"),
        exercise("sprint", &["冲刺跑", "冲刺"], "跑步类", 12.0, "vigorous", "高强度冲刺跑"),
        exercise("trail_running", &["越野跑"], "跑步类", 9.0, "vigorous", "山地越野跑"),
        exercise("cycling", &["骑行", "骑车", "骑自行车"], "骑行类", 6.0, "moderate", "普通速度骑行（约15-20km/h）"),
        exercise("cycling_leisure", &["休闲骑行", "慢骑"], "骑行类", 4.0, "light", "休闲慢骑（约10-15km/h）"),
        exercise("cycling_fast", &["快速骑行", "公路骑行"], "骑行类", 10.0, "vigorous", "快速骑行（约25km/h以上）"),
        exercise("spinning", &["动感单车"], "骑行类", 8.5, "vigorous", "室内动感单车课程"),
        exercise("swimming", &["游泳"], "游泳类", 7.0, "moderate", "中等强度游泳"),
        exercise("swimming_leisure", &["休闲游泳", "戏水"], "游泳类", 5.0, "light", "轻松游泳、戏水"),
        exercise("swimming_fast", &["快速游泳", "竞速游泳"], "游泳类", 10.0, "vigorous", "竞速游泳"),
        exercise("gym", &["健身", "健身房"], "健身房", 5.0, "moderate", "综合健身房训练"),
        exercise("weight_training", &["力量训练", "举重", "撸铁"], "健身房", 5.0, "moderate", "举重、器械训练"),
        exercise("aerobics", &["有氧操", "有氧"], "健身房", 6.5, "moderate", "有氧健身操"),
        exercise("hiit", &["高强度间歇", "间歇训练"], "健身房", 9.0, "vigorous", "高强度间歇训练"),
        exercise("yoga", &["瑜伽"], "身心类", 2.5, "light", "瑜伽练习"),
        exercise("pilates", &["普拉提"], "身心类", 3.0, "light", "普拉提训练"),
        exercise("tai_chi", &["太极", "太极拳"], "身心类", 3.0, "light", "太极拳练习"),
        exercise("stretching", &["拉伸", "伸展"], "身心类", 2.3, "light", "拉伸运动"),
        exercise("basketball", &["篮球", "打篮球"], "球类", 6.5, "moderate", "打篮球"),
        exercise("football", &["足球", "踢足球"], "球类", 7.0, "vigorous", "踢足球"),
        exercise("badminton", &["羽毛球"], "球类", 5.5, "moderate", "打羽毛球"),
        exercise("tennis", &["网球"], "球类", 7.0, "moderate", "打网球"),
        exercise("table_tennis", &["乒乓球"], "球类", 4.0, "light", "打乒乓球"),
        exercise("volleyball", &["排球"], "球类", 4.0, "light", "打排球"),
        exercise("dancing", &["跳舞", "舞蹈"], "其他", 5.0, "moderate", "一般舞蹈"),
        exercise("square_dancing", &["广场舞"], "其他", 4.5, "moderate", "广场舞"),
        exercise("jumping_rope", &["跳绳"], "其他", 11.0, "vigorous", "跳绳运动"),
        exercise("rowing", &["划船", "划船机"], "其他", 7.0, "moderate", "划船或划船机"),
        exercise("skating", &["滑冰", "轮滑"], "其他", 7.0, "moderate", "滑冰、轮滑"),
        exercise("park", &["公园活动", "公园"], "场地", 3.5, "light", "公园散步、活动"),
        exercise("indoor", &["室内运动", "室内"], "场地", 4.0, "light", "一般室内运动"),
        exercise("outdoor", &["户外运动", "室外", "户外"], "场地", 4.5, "moderate", "一般户外运动"),
    ]
}
