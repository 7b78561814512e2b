// src/sample_data/nutrition.rs - Chinese food composition table excerpt

use crate::rag::types::{FoodKnowledge, NutritionPer100g};

#[allow(clippy::too_many_arguments)]
fn food(
    name: &str,
    aliases: &[&str],
    category: &str,
    calories: f64,
    protein: f64,
    fat: f64,
    carbs: f64,
    fiber: f64,
    sodium: f64,
    serving: &str,
    notes: &str,
) -> FoodKnowledge {
    FoodKnowledge {
        food_name: name.to_string(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        category: category.to_string(),
        per_100g: NutritionPer100g {
            calories,
            protein,
            fat,
            carbs,
            fiber,
            sodium,
        },
        common_serving: serving.to_string(),
        cooking_notes: notes.to_string(),
    }
}

/// Per-100g reference entries. Values follow the Chinese food composition
/// table for the cooked dish as commonly served.
pub fn builtin_foods() -> Vec<FoodKnowledge> {
    vec![
        food("番茄炒蛋", &["西红柿炒蛋", "西红柿炒鸡蛋"], "家常菜", 150.0, 10.5, 8.2, 6.3, 1.2, 420.0, "一盘约300g", "用油量决定热量，少油版约120千卡"),
        food("宫保鸡丁", &["宫爆鸡丁"], "川菜", 180.0, 18.0, 10.0, 8.0, 1.5, 650.0, "一份约250g", "含花生米，油炸花生提高脂肪含量"),
        food("清蒸鲈鱼", &[], "鱼类", 105.0, 19.5, 3.0, 0.5, 0.0, 380.0, "一条约400g", "清蒸保留蛋白质，红烧热量上升约70%"),
        food("麻婆豆腐", &[], "川菜", 130.0, 8.5, 8.0, 5.5, 0.8, 720.0, "一份约250g", "豆瓣酱含钠较高"),
        food("鱼香肉丝", &[], "川菜", 190.0, 12.0, 12.0, 9.0, 1.0, 680.0, "一份约250g", "糖醋芡汁增加碳水"),
        food("红烧肉", &["东坡肉"], "家常菜", 480.0, 13.0, 45.0, 6.0, 0.0, 550.0, "一份约200g", "五花肉脂肪占比高，减脂期不建议"),
        food("白灼虾", &["水煮虾"], "海鲜", 90.0, 18.0, 1.5, 0.0, 0.0, 320.0, "一份约200g", "白灼方式热量最低"),
        food("清炒西兰花", &["蒜蓉西兰花"], "蔬菜", 35.0, 3.5, 0.5, 5.0, 2.8, 180.0, "一盘约250g", "短时快炒保留维生素C"),
        food("蒸蛋羹", &["鸡蛋羹", "水蒸蛋"], "蛋类", 65.0, 6.5, 4.0, 1.0, 0.0, 260.0, "一碗约150g", "无需额外油脂"),
        food("米饭", &["白米饭", "大米饭"], "主食", 116.0, 2.6, 0.3, 25.9, 0.3, 2.0, "一碗约150g", "蒸制，冷却后抗性淀粉略升"),
        food("馒头", &[], "主食", 221.0, 7.0, 1.1, 45.7, 1.3, 165.0, "一个约100g", "发酵面食"),
        food("牛肉面", &["兰州拉面"], "面食", 135.0, 8.0, 3.2, 20.0, 0.9, 890.0, "一碗约500g", "汤含钠高，建议少喝汤"),
        food("小米粥", &[], "粥类", 45.0, 1.5, 0.3, 9.5, 0.3, 2.0, "一碗约250g", "稀粥含水量高"),
        food("豆浆", &["黄豆浆"], "豆制品", 35.0, 3.0, 1.5, 2.5, 1.1, 3.0, "一杯约300ml", "无糖豆浆，加糖后碳水翻倍"),
        food("水煮蛋", &["白煮蛋", "煮鸡蛋"], "蛋类", 144.0, 13.1, 9.5, 1.5, 0.0, 131.0, "一个约50g", "整蛋水煮"),
        food("鸡胸肉", &["鸡胸脯肉"], "禽肉", 133.0, 24.6, 3.1, 0.0, 0.0, 63.0, "一块约150g", "水煮或煎制，去皮"),
        food("红烧牛肉", &[], "肉类", 250.0, 26.0, 15.0, 3.0, 0.0, 620.0, "一份约200g", "炖煮软烂，酱汁含糖"),
        food("糖醋排骨", &[], "肉类", 280.0, 18.0, 16.0, 15.0, 0.0, 540.0, "一份约200g", "糖醋汁碳水较高"),
        food("香煎三文鱼", &["煎三文鱼"], "鱼类", 200.0, 22.0, 12.0, 0.0, 0.0, 350.0, "一块约150g", "富含不饱和脂肪酸"),
        food("凉拌黄瓜", &["拍黄瓜"], "蔬菜", 20.0, 0.8, 0.2, 3.5, 0.7, 280.0, "一盘约200g", "凉拌，几乎无油"),
        food("蒜蓉菠菜", &["清炒菠菜"], "蔬菜", 40.0, 3.0, 1.0, 4.5, 2.2, 240.0, "一盘约250g", "焯水去草酸"),
        food("青椒肉丝", &[], "家常菜", 180.0, 15.0, 10.0, 5.0, 1.1, 520.0, "一份约250g", "瘦猪肉丝快炒"),
        food("西红柿牛腩", &["番茄牛腩"], "炖菜", 160.0, 14.0, 8.0, 6.0, 0.9, 480.0, "一份约300g", "炖煮，汤汁热量低"),
        food("家常豆腐", &[], "豆制品", 130.0, 9.0, 7.0, 6.0, 0.6, 560.0, "一份约250g", "先煎后烧，煎制吸油"),
        food("木须肉", &[], "家常菜", 170.0, 12.0, 10.0, 8.0, 1.4, 510.0, "一份约250g", "含鸡蛋与木耳"),
        food("烤鸡翅", &[], "禽肉", 200.0, 20.0, 13.0, 0.5, 0.0, 440.0, "两个约120g", "烤制，带皮脂肪较高"),
        food("蛋炒饭", &["扬州炒饭"], "主食", 185.0, 5.5, 7.0, 25.0, 0.5, 470.0, "一碗约300g", "隔夜饭炒制，油量决定热量"),
        food("炸酱面", &[], "面食", 210.0, 8.0, 7.5, 28.0, 1.2, 980.0, "一碗约400g", "炸酱含黄豆酱与猪肉末"),
        food("酸奶", &["无糖酸奶"], "乳制品", 70.0, 3.5, 3.0, 7.0, 0.0, 60.0, "一杯约200g", "全脂无糖"),
        food("燕麦牛奶", &["牛奶燕麦粥"], "早餐", 150.0, 6.0, 5.0, 20.0, 1.8, 80.0, "一碗约250g", "即食燕麦加全脂牛奶"),
        food("苹果", &[], "水果", 52.0, 0.3, 0.2, 13.0, 1.8, 1.0, "一个约200g", "带皮食用膳食纤维更高"),
        food("香蕉", &[], "水果", 90.0, 1.2, 0.3, 22.0, 1.2, 1.0, "一根约120g", "运动前后补充碳水"),
        food("全麦面包", &[], "面食", 246.0, 8.5, 3.5, 47.0, 6.0, 400.0, "两片约80g", "全麦粉占比决定纤维含量"),
        food("皮蛋瘦肉粥", &[], "粥类", 60.0, 3.5, 1.5, 8.5, 0.2, 350.0, "一碗约300g", "含皮蛋与猪瘦肉"),
        food("酸辣土豆丝", &[], "家常菜", 95.0, 1.8, 4.0, 13.5, 1.0, 460.0, "一盘约250g", "醋溜快炒"),
        food("坚果拼盘", &["混合坚果"], "坚果", 580.0, 18.0, 50.0, 15.0, 7.0, 150.0, "一小把约30g", "高能量密度，注意份量"),
    ]
}
