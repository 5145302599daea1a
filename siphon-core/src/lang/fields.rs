//! Semantic field-name translation.
//!
//! Maps field categories to language-specific aliases so content mapping
//! can find "title"-like or "requirements"-like keys in responses served
//! in any supported language. English aliases are always appended as a
//! fallback.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

type AliasTable = HashMap<&'static str, Vec<(&'static str, &'static [&'static str])>>;

/// `category -> [(language, aliases)]`.
static FIELD_ALIASES: Lazy<AliasTable> = Lazy::new(|| {
    let mut table: AliasTable = HashMap::new();

    table.insert(
        "title",
        vec![
            ("en", &["title", "headline", "heading"] as &[_]),
            ("es", &["titulo", "título", "encabezado"]),
            ("fr", &["titre", "intitule", "intitulé"]),
            ("de", &["titel", "überschrift", "uberschrift"]),
            ("it", &["titolo", "intestazione"]),
            ("pt", &["titulo", "título", "cabecalho"]),
            ("nl", &["titel", "kop"]),
            ("ru", &["заголовок", "название"]),
            ("zh", &["标题", "題目"]),
            ("ja", &["タイトル", "題名", "見出し"]),
            ("ko", &["제목", "타이틀"]),
            ("ar", &["العنوان", "عنوان"]),
            ("tr", &["baslik", "başlık"]),
            ("pl", &["tytul", "tytuł", "naglowek"]),
            ("hi", &["शीर्षक"]),
        ],
    );
    table.insert(
        "description",
        vec![
            ("en", &["description", "desc", "about"] as &[_]),
            ("es", &["descripcion", "descripción", "acerca"]),
            ("fr", &["description", "apropos", "àpropos"]),
            ("de", &["beschreibung"]),
            ("it", &["descrizione"]),
            ("pt", &["descricao", "descrição"]),
            ("nl", &["beschrijving", "omschrijving"]),
            ("ru", &["описание"]),
            ("zh", &["描述", "简介"]),
            ("ja", &["説明", "概要"]),
            ("ko", &["설명", "소개"]),
            ("ar", &["الوصف", "وصف"]),
            ("tr", &["aciklama", "açıklama"]),
            ("pl", &["opis"]),
        ],
    );
    table.insert(
        "body",
        vec![
            ("en", &["body", "content", "text", "article"] as &[_]),
            ("es", &["cuerpo", "contenido", "texto"]),
            ("fr", &["corps", "contenu", "texte"]),
            ("de", &["inhalt", "text", "haupttext"]),
            ("it", &["corpo", "contenuto", "testo"]),
            ("pt", &["corpo", "conteudo", "conteúdo", "texto"]),
            ("nl", &["inhoud", "tekst"]),
            ("ru", &["содержание", "текст"]),
            ("zh", &["正文", "内容"]),
            ("ja", &["本文", "内容"]),
            ("ko", &["본문", "내용"]),
            ("ar", &["المحتوى", "النص"]),
            ("tr", &["icerik", "içerik", "metin"]),
            ("pl", &["tresc", "treść", "tekst"]),
        ],
    );
    table.insert(
        "requirements",
        vec![
            ("en", &["requirements", "prerequisites", "required"] as &[_]),
            ("es", &["requisitos", "requerimientos"]),
            ("fr", &["exigences", "conditions", "prerequis", "prérequis"]),
            ("de", &["anforderungen", "voraussetzungen"]),
            ("it", &["requisiti"]),
            ("pt", &["requisitos", "exigencias", "exigências"]),
            ("nl", &["vereisten", "voorwaarden"]),
            ("ru", &["требования"]),
            ("zh", &["要求", "条件"]),
            ("ja", &["要件", "条件"]),
            ("ko", &["요구사항", "조건"]),
            ("ar", &["المتطلبات", "الشروط"]),
            ("tr", &["gereksinimler", "sartlar", "şartlar"]),
            ("pl", &["wymagania"]),
        ],
    );
    table.insert(
        "documents",
        vec![
            ("en", &["documents", "documentation", "docs", "files"] as &[_]),
            ("es", &["documentos", "documentacion", "documentación"]),
            ("fr", &["documents", "pieces", "pièces"]),
            ("de", &["dokumente", "unterlagen"]),
            ("it", &["documenti"]),
            ("pt", &["documentos"]),
            ("nl", &["documenten"]),
            ("ru", &["документы"]),
            ("zh", &["文件", "资料"]),
            ("ja", &["書類", "文書"]),
            ("ko", &["서류", "문서"]),
            ("ar", &["الوثائق", "المستندات"]),
            ("tr", &["belgeler", "dokumanlar", "dokümanlar"]),
            ("pl", &["dokumenty"]),
        ],
    );
    table.insert(
        "fees",
        vec![
            ("en", &["fees", "fee", "cost", "costs", "charges"] as &[_]),
            ("es", &["tarifas", "tasas", "costos", "costes"]),
            ("fr", &["frais", "tarifs", "couts", "coûts"]),
            ("de", &["gebühren", "gebuehren", "kosten"]),
            ("it", &["tariffe", "costi"]),
            ("pt", &["taxas", "tarifas", "custos"]),
            ("nl", &["kosten", "tarieven"]),
            ("ru", &["сборы", "стоимость"]),
            ("zh", &["费用", "收费"]),
            ("ja", &["料金", "手数料", "費用"]),
            ("ko", &["수수료", "비용"]),
            ("ar", &["الرسوم", "التكاليف"]),
            ("tr", &["ucretler", "ücretler"]),
            ("pl", &["oplaty", "opłaty", "koszty"]),
        ],
    );
    table.insert(
        "timeline",
        vec![
            ("en", &["timeline", "duration", "processing_time", "schedule"] as &[_]),
            ("es", &["plazo", "plazos", "duracion", "duración", "cronograma"]),
            ("fr", &["delai", "délai", "duree", "durée", "calendrier"]),
            ("de", &["frist", "dauer", "zeitplan"]),
            ("it", &["tempistica", "durata", "scadenzario"]),
            ("pt", &["prazo", "prazos", "duracao", "duração"]),
            ("nl", &["termijn", "duur", "planning"]),
            ("ru", &["сроки", "срок"]),
            ("zh", &["时间表", "期限"]),
            ("ja", &["期間", "スケジュール", "所要時間"]),
            ("ko", &["기간", "일정"]),
            ("ar", &["الجدول", "المدة"]),
            ("tr", &["sure", "süre", "takvim"]),
            ("pl", &["termin", "harmonogram"]),
        ],
    );
    table.insert(
        "application",
        vec![
            ("en", &["application", "apply", "form", "request"] as &[_]),
            ("es", &["solicitud", "aplicacion", "aplicación", "formulario"]),
            ("fr", &["demande", "candidature", "formulaire"]),
            ("de", &["antrag", "bewerbung", "formular"]),
            ("it", &["domanda", "richiesta", "modulo"]),
            ("pt", &["solicitacao", "solicitação", "pedido", "formulario", "formulário"]),
            ("nl", &["aanvraag", "formulier"]),
            ("ru", &["заявление", "заявка"]),
            ("zh", &["申请", "申請"]),
            ("ja", &["申請", "申し込み"]),
            ("ko", &["신청", "지원"]),
            ("ar", &["الطلب", "التقديم"]),
            ("tr", &["basvuru", "başvuru"]),
            ("pl", &["wniosek", "zgloszenie", "zgłoszenie"]),
        ],
    );
    table.insert(
        "status",
        vec![
            ("en", &["status", "state"] as &[_]),
            ("es", &["estado", "estatus"]),
            ("fr", &["statut", "etat", "état"]),
            ("de", &["status", "zustand"]),
            ("it", &["stato"]),
            ("pt", &["estado", "situacao", "situação"]),
            ("nl", &["status", "toestand"]),
            ("ru", &["статус", "состояние"]),
            ("zh", &["状态", "狀態"]),
            ("ja", &["状態", "ステータス"]),
            ("ko", &["상태"]),
            ("ar", &["الحالة"]),
            ("tr", &["durum"]),
            ("pl", &["status", "stan"]),
        ],
    );
    table.insert(
        "contact",
        vec![
            ("en", &["contact", "email", "phone"] as &[_]),
            ("es", &["contacto", "correo", "telefono", "teléfono"]),
            ("fr", &["contact", "courriel", "telephone", "téléphone"]),
            ("de", &["kontakt", "telefon"]),
            ("it", &["contatto", "telefono"]),
            ("pt", &["contato", "contacto", "telefone"]),
            ("nl", &["contact", "telefoon"]),
            ("ru", &["контакт", "телефон"]),
            ("zh", &["联系", "聯絡"]),
            ("ja", &["連絡先", "連絡"]),
            ("ko", &["연락처", "문의"]),
            ("ar", &["اتصال", "الهاتف"]),
            ("tr", &["iletisim", "iletişim"]),
            ("pl", &["kontakt"]),
        ],
    );
    table.insert(
        "address",
        vec![
            ("en", &["address", "location"] as &[_]),
            ("es", &["direccion", "dirección", "ubicacion", "ubicación"]),
            ("fr", &["adresse", "lieu"]),
            ("de", &["adresse", "anschrift", "standort"]),
            ("it", &["indirizzo", "sede"]),
            ("pt", &["endereco", "endereço", "localizacao", "localização"]),
            ("nl", &["adres", "locatie"]),
            ("ru", &["адрес", "местоположение"]),
            ("zh", &["地址", "位置"]),
            ("ja", &["住所", "所在地"]),
            ("ko", &["주소", "위치"]),
            ("ar", &["العنوان", "الموقع"]),
            ("tr", &["adres", "konum"]),
            ("pl", &["adres", "lokalizacja"]),
        ],
    );
    table.insert(
        "date",
        vec![
            ("en", &["date", "created", "published", "updated"] as &[_]),
            ("es", &["fecha", "creado", "publicado"]),
            ("fr", &["date", "cree", "créé", "publie", "publié"]),
            ("de", &["datum", "erstellt", "veroffentlicht", "veröffentlicht"]),
            ("it", &["data", "creato", "pubblicato"]),
            ("pt", &["data", "criado", "publicado"]),
            ("nl", &["datum", "gemaakt", "gepubliceerd"]),
            ("ru", &["дата", "создано"]),
            ("zh", &["日期", "创建"]),
            ("ja", &["日付", "作成日"]),
            ("ko", &["날짜", "작성일"]),
            ("ar", &["التاريخ"]),
            ("tr", &["tarih"]),
            ("pl", &["data", "utworzono"]),
        ],
    );
    table.insert(
        "deadline",
        vec![
            ("en", &["deadline", "due", "due_date", "expires"] as &[_]),
            ("es", &["fecha_limite", "fechalimite", "vencimiento"]),
            ("fr", &["date_limite", "datelimite", "echeance", "échéance"]),
            ("de", &["frist", "stichtag", "ablauf"]),
            ("it", &["scadenza", "termine"]),
            ("pt", &["prazo_final", "prazofinal", "vencimento"]),
            ("nl", &["deadline", "uiterste_datum", "uiterstedatum"]),
            ("ru", &["крайний_срок", "крайнийсрок", "дедлайн"]),
            ("zh", &["截止日期", "期限"]),
            ("ja", &["締め切り", "締切", "期限"]),
            ("ko", &["마감일", "마감"]),
            ("ar", &["الموعد_النهائي", "الموعدالنهائي"]),
            ("tr", &["son_tarih", "sontarih"]),
            ("pl", &["termin_koncowy", "terminkoncowy"]),
        ],
    );
    table.insert(
        "price",
        vec![
            ("en", &["price", "amount", "total"] as &[_]),
            ("es", &["precio", "importe", "monto"]),
            ("fr", &["prix", "montant"]),
            ("de", &["preis", "betrag"]),
            ("it", &["prezzo", "importo"]),
            ("pt", &["preco", "preço", "valor"]),
            ("nl", &["prijs", "bedrag"]),
            ("ru", &["цена", "сумма"]),
            ("zh", &["价格", "金额"]),
            ("ja", &["価格", "値段", "金額"]),
            ("ko", &["가격", "금액"]),
            ("ar", &["السعر", "المبلغ"]),
            ("tr", &["fiyat", "tutar"]),
            ("pl", &["cena", "kwota"]),
        ],
    );
    table.insert(
        "name",
        vec![
            ("en", &["name", "fullname", "full_name"] as &[_]),
            ("es", &["nombre", "nombre_completo", "nombrecompleto"]),
            ("fr", &["nom", "nom_complet", "nomcomplet"]),
            ("de", &["name", "vollstandiger_name"]),
            ("it", &["nome", "nome_completo"]),
            ("pt", &["nome", "nome_completo"]),
            ("nl", &["naam", "volledige_naam"]),
            ("ru", &["имя", "название"]),
            ("zh", &["名称", "姓名"]),
            ("ja", &["名前", "氏名", "名称"]),
            ("ko", &["이름", "성명"]),
            ("ar", &["الاسم", "اسم"]),
            ("tr", &["ad", "isim"]),
            ("pl", &["nazwa", "imie", "imię"]),
        ],
    );
    table.insert(
        "author",
        vec![
            ("en", &["author", "by", "creator", "writer"] as &[_]),
            ("es", &["autor", "autora", "creador"]),
            ("fr", &["auteur", "createur", "créateur"]),
            ("de", &["autor", "verfasser", "ersteller"]),
            ("it", &["autore", "creatore"]),
            ("pt", &["autor", "autora", "criador"]),
            ("nl", &["auteur", "schrijver", "maker"]),
            ("ru", &["автор"]),
            ("zh", &["作者"]),
            ("ja", &["著者", "作者", "執筆者"]),
            ("ko", &["저자", "작성자"]),
            ("ar", &["المؤلف", "الكاتب"]),
            ("tr", &["yazar"]),
            ("pl", &["autor"]),
        ],
    );
    table.insert(
        "summary",
        vec![
            ("en", &["summary", "abstract", "excerpt", "overview"] as &[_]),
            ("es", &["resumen", "extracto", "sumario"]),
            ("fr", &["resume", "résumé", "sommaire", "extrait"]),
            ("de", &["zusammenfassung", "überblick", "uberblick"]),
            ("it", &["riassunto", "sommario", "estratto"]),
            ("pt", &["resumo", "sumario", "sumário"]),
            ("nl", &["samenvatting", "overzicht"]),
            ("ru", &["резюме", "аннотация"]),
            ("zh", &["摘要", "概要"]),
            ("ja", &["要約", "概要", "抜粋"]),
            ("ko", &["요약", "개요"]),
            ("ar", &["ملخص", "الملخص"]),
            ("tr", &["ozet", "özet"]),
            ("pl", &["podsumowanie", "streszczenie"]),
        ],
    );

    table
});

/// Lookups normalize by lowercasing and stripping `-` and `_`.
fn normalize(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect()
}

/// Aliases for a category in a language, with English fallback appended.
pub fn aliases_for(category: &str, language: &str) -> Vec<&'static str> {
    let Some(entries) = FIELD_ALIASES.get(category) else {
        return Vec::new();
    };

    let mut aliases: Vec<&'static str> = Vec::new();
    let language = language.to_lowercase();

    for (lang, list) in entries {
        if *lang == language {
            aliases.extend(list.iter().copied());
        }
    }
    // English fallback always applies
    if language != "en" {
        for (lang, list) in entries {
            if *lang == "en" {
                aliases.extend(list.iter().copied());
            }
        }
    }
    aliases
}

/// Known field categories.
pub fn categories() -> Vec<&'static str> {
    FIELD_ALIASES.keys().copied().collect()
}

/// Extract a field from a JSON response by category and language: each
/// alias is tried as a direct key, then case-insensitively; the first
/// non-null value wins.
pub fn extract_field_by_category<'a>(
    data: &'a Value,
    category: &str,
    language: &str,
) -> Option<&'a Value> {
    let object = data.as_object()?;

    for alias in aliases_for(category, language) {
        if let Some(value) = object.get(alias) {
            if !value.is_null() {
                return Some(value);
            }
        }

        let normalized = normalize(alias);
        for (key, value) in object {
            if normalize(key) == normalized && !value.is_null() {
                return Some(value);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aliases_include_english_fallback() {
        let aliases = aliases_for("requirements", "es");
        assert!(aliases.contains(&"requisitos"));
        assert!(aliases.contains(&"requirements"));
    }

    #[test]
    fn test_extract_spanish_requirements() {
        let data = json!({"requisitos": ["pasaporte", "foto"]});
        let value = extract_field_by_category(&data, "requirements", "es").unwrap();
        assert_eq!(value, &json!(["pasaporte", "foto"]));
    }

    #[test]
    fn test_extract_falls_back_to_english() {
        let data = json!({"requirements": ["passport"]});
        let value = extract_field_by_category(&data, "requirements", "es").unwrap();
        assert_eq!(value, &json!(["passport"]));
    }

    #[test]
    fn test_case_insensitive_key() {
        let data = json!({"Titre": "Bonjour"});
        let value = extract_field_by_category(&data, "title", "fr").unwrap();
        assert_eq!(value, &json!("Bonjour"));
    }

    #[test]
    fn test_normalized_key_matches_separators() {
        let data = json!({"fecha-limite": "2026-01-01"});
        let value = extract_field_by_category(&data, "deadline", "es").unwrap();
        assert_eq!(value, &json!("2026-01-01"));
    }

    #[test]
    fn test_null_values_are_skipped() {
        let data = json!({"titulo": null, "title": "fallback"});
        let value = extract_field_by_category(&data, "title", "es").unwrap();
        assert_eq!(value, &json!("fallback"));
    }

    #[test]
    fn test_unknown_category_yields_none() {
        let data = json!({"x": 1});
        assert!(extract_field_by_category(&data, "nonexistent", "en").is_none());
    }

    #[test]
    fn test_all_categories_present() {
        for category in [
            "title",
            "description",
            "body",
            "requirements",
            "documents",
            "fees",
            "timeline",
            "application",
            "status",
            "contact",
            "address",
            "date",
            "deadline",
            "price",
            "name",
            "author",
            "summary",
        ] {
            assert!(
                FIELD_ALIASES.contains_key(category),
                "missing category {category}"
            );
        }
    }
}
