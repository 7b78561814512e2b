// src/sample_data/recipes.rs - Dish-ingredient-allergen knowledge graph

use crate::rag::types::{AllergenSource, RecipeKnowledge};
use std::collections::BTreeMap;

fn source(ingredient: &str, note: &str, direct: bool) -> AllergenSource {
    AllergenSource {
        ingredient: ingredient.to_string(),
        note: note.to_string(),
        direct,
    }
}

fn recipe(
    dish_name: &str,
    aliases: &[&str],
    ingredients: &[&str],
    allergens: Vec<(&str, AllergenSource)>,
    hidden_notes: &str,
) -> RecipeKnowledge {
    RecipeKnowledge {
        dish_name: dish_name.to_string(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
        allergens: allergens
            .into_iter()
            .map(|(code, src)| (code.to_string(), src))
            .collect::<BTreeMap<_, _>>(),
        hidden_allergen_notes: hidden_notes.to_string(),
    }
}

pub fn builtin_recipes() -> Vec<RecipeKnowledge> {
    vec![
        recipe(
            "宫保鸡丁",
            &["宫爆鸡丁"],
            &["鸡腿肉", "花生米", "干辣椒", "花椒", "酱油", "料酒", "白糖"],
            vec![
                ("peanut", source("花生米", "油炸花生米为标配配料", true)),
                ("soy", source("酱油", "调味使用酱油", false)),
                ("wheat", source("酱油", "酿造酱油含小麦", false)),
            ],
            "宫保鸡丁几乎总是含花生；酱油同时引入大豆与小麦麸质",
        ),
        recipe(
            "蛋炒饭",
            &["扬州炒饭"],
            &["米饭", "鸡蛋", "葱花", "食用油", "盐"],
            vec![("egg", source("鸡蛋", "主要配料", true))],
            "部分做法加入虾仁或火腿，外食需留意甲壳类",
        ),
        recipe(
            "鱼香肉丝",
            &[],
            &["猪里脊", "木耳", "胡萝卜", "泡椒", "豆瓣酱", "酱油", "醋", "白糖"],
            vec![
                ("soy", source("豆瓣酱", "鱼香汁以豆瓣酱打底", false)),
                ("wheat", source("豆瓣酱", "豆瓣酱与酱油含小麦", false)),
            ],
            "菜名带鱼字但不含鱼；隐性过敏原来自豆瓣酱和酱油",
        ),
        recipe(
            "麻婆豆腐",
            &[],
            &["豆腐", "牛肉末", "豆瓣酱", "豆豉", "花椒", "辣椒面"],
            vec![
                ("soy", source("豆腐", "主料为大豆制品", true)),
                ("wheat", source("豆瓣酱", "酿造酱料含小麦", false)),
            ],
            "豆瓣酱与豆豉为发酵大豆制品",
        ),
        recipe(
            "清蒸鲈鱼",
            &[],
            &["鲈鱼", "姜", "葱", "蒸鱼豉油"],
            vec![
                ("fish", source("鲈鱼", "主料", true)),
                ("soy", source("蒸鱼豉油", "豉油为大豆制品", false)),
                ("wheat", source("蒸鱼豉油", "豉油酿造含小麦", false)),
            ],
            "蒸鱼豉油引入大豆与小麦",
        ),
        recipe(
            "番茄炒蛋",
            &["西红柿炒蛋"],
            &["番茄", "鸡蛋", "食用油", "盐", "白糖"],
            vec![("egg", source("鸡蛋", "主要配料", true))],
            "",
        ),
        recipe(
            "炸酱面",
            &[],
            &["面条", "黄豆酱", "猪肉末", "黄瓜丝", "豆芽"],
            vec![
                ("wheat", source("面条", "小麦面条为主料", true)),
                ("soy", source("黄豆酱", "炸酱以黄豆酱为主", true)),
            ],
            "",
        ),
        recipe(
            "青团",
            &[],
            &["糯米粉", "艾草汁", "豆沙馅", "猪油"],
            vec![("soy", source("豆沙馅", "红豆沙常混入大豆成分", false))],
            "部分馅料含芝麻或花生碎，购买时需确认",
        ),
        recipe(
            "白灼虾",
            &["水煮虾"],
            &["基围虾", "姜", "葱", "酱油"],
            vec![
                ("shellfish", source("基围虾", "主料", true)),
                ("soy", source("酱油", "蘸料含酱油", false)),
            ],
            "蘸料酱油含大豆与小麦",
        ),
        recipe(
            "扬州狮子头",
            &["红烧狮子头"],
            &["猪肉末", "马蹄", "鸡蛋", "淀粉", "酱油"],
            vec![
                ("egg", source("鸡蛋", "肉丸用蛋液上浆", false)),
                ("soy", source("酱油", "红烧汁含酱油", false)),
                ("wheat", source("酱油", "酱油酿造含小麦", false)),
            ],
            "肉丸以蛋液与淀粉成型，表面看不出含蛋",
        ),
        recipe(
            "奶油蘑菇汤",
            &[],
            &["蘑菇", "淡奶油", "黄油", "面粉", "洋葱"],
            vec![
                ("milk", source("淡奶油", "奶油与黄油为乳制品", true)),
                ("wheat", source("面粉", "面粉炒制增稠", false)),
            ],
            "西式浓汤常以面粉增稠，麸质不可见",
        ),
        recipe(
            "沙茶牛肉",
            &[],
            &["牛肉", "沙茶酱", "洋葱", "酱油"],
            vec![
                ("peanut", source("沙茶酱", "沙茶酱含花生", false)),
                ("fish", source("沙茶酱", "沙茶酱含鱼干成分", false)),
                ("shellfish", source("沙茶酱", "沙茶酱含虾米", false)),
                ("soy", source("酱油", "调味含酱油", false)),
            ],
            "沙茶酱同时含花生、鱼干和虾米，是典型的隐性过敏原来源",
        ),
        recipe(
            "拍黄瓜",
            &["凉拌黄瓜"],
            &["黄瓜", "蒜", "香油", "醋", "芝麻酱"],
            vec![("tree_nut", source("芝麻酱", "部分做法淋芝麻酱或花生碎", false))],
            "凉拌菜浇头差异大，外食需确认是否含花生碎或芝麻酱",
        ),
        recipe(
            "虾仁馄饨",
            &[],
            &["馄饨皮", "虾仁", "猪肉末", "鸡蛋"],
            vec![
                ("wheat", source("馄饨皮", "面皮为小麦制品", true)),
                ("shellfish", source("虾仁", "馅料含虾", true)),
                ("egg", source("鸡蛋", "馅料以蛋液调和", false)),
            ],
            "馅料中的蛋液从外观无法辨认",
        ),
        recipe(
            "杏仁豆腐",
            &[],
            &["杏仁露", "牛奶", "琼脂", "糖"],
            vec![
                ("tree_nut", source("杏仁露", "以杏仁磨浆", true)),
                ("milk", source("牛奶", "奶冻基底", true)),
            ],
            "名为豆腐但不含大豆",
        ),
        recipe(
            "三鲜水饺",
            &[],
            &["饺子皮", "猪肉", "虾仁", "韭菜", "鸡蛋"],
            vec![
                ("wheat", source("饺子皮", "面皮为小麦制品", true)),
                ("shellfish", source("虾仁", "三鲜馅含虾", false)),
                ("egg", source("鸡蛋", "馅料含蛋", false)),
            ],
            "三鲜馅的虾仁和鸡蛋从菜名无法判断",
        ),
    ]
}
