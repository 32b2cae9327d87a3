// src/language.rs

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Supported display languages. Pass/fail logic never depends on the language.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Language {
    #[default]
    #[strum(to_string = "English", serialize = "en")]
    #[serde(rename = "English", alias = "en")]
    English,
    #[strum(to_string = "Polski", serialize = "pl")]
    #[serde(rename = "Polski", alias = "pl")]
    Polish,
    #[strum(to_string = "Русский", serialize = "ru")]
    #[serde(rename = "Русский", alias = "ru")]
    Russian,
    #[strum(to_string = "Deutsch", serialize = "de")]
    #[serde(rename = "Deutsch", alias = "de")]
    German,
    #[strum(to_string = "Español", serialize = "es")]
    #[serde(rename = "Español", alias = "es")]
    Spanish,
}

/// Presentation state handed explicitly to listing and report rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplaySettings {
    pub language: Language,
}

impl DisplaySettings {
    pub fn new(language: Language) -> Self {
        Self { language }
    }
}

/// Every user-facing line the engine can emit. Placeholders in braces are
/// substituted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    DnsLabel,
    PowerLabel,
    DnsApplying,
    PowerApplying,
    DnsReportHeader,
    DnsParseFailed,
    Ipv6PolicyCaveat,
    DnsAdaptersUpdated,
    PowerFailed,
    PowerUnverified,
    SchemeGuidUnresolved,
    ElevationDenied,
    ElevationFailed,
    CommandFailed,
    TweakWarnings,
    NoScripts,
    RunningScript,
    BackupStarted,
    BackupSaved,
    BackupFailed,
    RunCancelled,
    AllApplied,
}

impl Message {
    pub fn text(self, language: Language) -> &'static str {
        let [en, pl, ru, de, es] = self.table();
        match language {
            Language::English => en,
            Language::Polish => pl,
            Language::Russian => ru,
            Language::German => de,
            Language::Spanish => es,
        }
    }

    fn table(self) -> [&'static str; 5] {
        match self {
            Message::DnsLabel => [
                "Change DNS to Cloudflare (malware blocking + better responsiveness)",
                "Zmiana DNS na Cloudflare (blokowanie malware + lepsza responsywność)",
                "Смена DNS на Cloudflare (блокировка вредоносного ПО + лучшая отзывчивость)",
                "DNS auf Cloudflare ändern (Malware-Block + bessere Reaktionszeit)",
                "Cambiar DNS a Cloudflare (bloqueo de malware + mejor respuesta)",
            ],
            Message::PowerLabel => [
                "Power plan: Ultimate Performance (create + activate)",
                "Plan zasilania: Najwyższa wydajność (utwórz + aktywuj)",
                "План питания: Максимальная производительность (создать + активировать)",
                "Energieplan: Ultimative Leistung (erstellen + aktivieren)",
                "Plan de energía: Máximo rendimiento (crear + activar)",
            ],
            Message::DnsApplying => [
                "Applying Cloudflare DNS (malware blocking + better responsiveness)...",
                "Ustawianie DNS Cloudflare (blokowanie malware + lepsza responsywność)...",
                "Применение DNS Cloudflare (блокировка вредоносного ПО + лучшая отзывчивость)...",
                "Cloudflare-DNS wird gesetzt (Malware-Block + bessere Reaktionszeit)...",
                "Aplicando DNS de Cloudflare (bloqueo de malware + mejor respuesta)...",
            ],
            Message::PowerApplying => [
                "Creating and activating Ultimate Performance power plan...",
                "Tworzenie i aktywacja planu zasilania Najwyższa wydajność...",
                "Создание и активация плана питания Максимальная производительность...",
                "Erstelle und aktiviere Energieplan Ultimative Leistung...",
                "Creando y activando el plan de energía Máximo rendimiento...",
            ],
            Message::DnsReportHeader => [
                "DNS on active adapters:",
                "DNS na aktywnych interfejsach:",
                "DNS на активных адаптерах:",
                "DNS auf aktiven Adaptern:",
                "DNS en adaptadores activos:",
            ],
            Message::DnsParseFailed => [
                "Could not parse DNS configuration.",
                "Nie udało się sparsować konfiguracji DNS.",
                "Не удалось разобрать конфигурацию DNS.",
                "DNS-Konfiguration konnte nicht geparst werden.",
                "No se pudo analizar la configuración DNS.",
            ],
            Message::Ipv6PolicyCaveat => [
                "ℹ️ IPv6 may be disabled by system policy (HKLM...\\Tcpip6\\Parameters\\DisabledComponents ≠ 0).",
                "ℹ️ IPv6 może być wyłączone polityką systemową (HKLM...\\Tcpip6\\Parameters\\DisabledComponents ≠ 0).",
                "ℹ️ IPv6 может быть отключён политикой системы (HKLM...\\Tcpip6\\Parameters\\DisabledComponents ≠ 0).",
                "ℹ️ IPv6 könnte per Systemrichtlinie deaktiviert sein (HKLM...\\Tcpip6\\Parameters\\DisabledComponents ≠ 0).",
                "ℹ️ IPv6 puede estar deshabilitado por política del sistema (HKLM...\\Tcpip6\\Parameters\\DisabledComponents ≠ 0).",
            ],
            Message::DnsAdaptersUpdated => [
                "Adapters fully updated: {done} of {total}.",
                "W pełni zaktualizowane interfejsy: {done} z {total}.",
                "Полностью обновлено адаптеров: {done} из {total}.",
                "Vollständig aktualisierte Adapter: {done} von {total}.",
                "Adaptadores actualizados por completo: {done} de {total}.",
            ],
            Message::PowerFailed => [
                "⚠ Could not create or activate Ultimate Performance plan.",
                "⚠ Nie udało się utworzyć lub aktywować planu Najwyższa wydajność.",
                "⚠ Не удалось создать или активировать план Максимальная производительность.",
                "⚠ Plan Ultimative Leistung konnte nicht erstellt oder aktiviert werden.",
                "⚠ No se pudo crear o activar el plan Máximo rendimiento.",
            ],
            Message::PowerUnverified => [
                "Could not read the active power plan.",
                "Nie udało się odczytać aktywnego planu zasilania.",
                "Не удалось прочитать активный план питания.",
                "Aktiver Energieplan konnte nicht gelesen werden.",
                "No se pudo leer el plan de energía activo.",
            ],
            Message::SchemeGuidUnresolved => [
                "⚠ Could not determine the duplicated plan GUID.",
                "⚠ Nie udało się ustalić GUID zduplikowanego planu.",
                "⚠ Не удалось определить GUID созданного плана.",
                "⚠ GUID des duplizierten Plans konnte nicht ermittelt werden.",
                "⚠ No se pudo determinar el GUID del plan duplicado.",
            ],
            Message::ElevationDenied => [
                "⚠ Administrator permission denied (UAC cancelled).",
                "⚠ Odmowa uprawnień administratora (anulowano UAC).",
                "⚠ Отказано в правах администратора (UAC отменён).",
                "⚠ Administratorrechte verweigert (UAC abgebrochen).",
                "⚠ Permiso de administrador denegado (UAC cancelado).",
            ],
            Message::ElevationFailed => [
                "⚠ Could not obtain administrator rights.",
                "⚠ Nie udało się uzyskać uprawnień administratora.",
                "⚠ Не удалось получить права администратора.",
                "⚠ Administratorrechte konnten nicht erlangt werden.",
                "⚠ No se pudieron obtener privilegios de administrador.",
            ],
            Message::CommandFailed => [
                "⚠ The command failed (exit code {code}).",
                "⚠ Komenda nie powiodła się (kod wyjścia {code}).",
                "⚠ Команда завершилась ошибкой (код выхода {code}).",
                "⚠ Befehl fehlgeschlagen (Exit-Code {code}).",
                "⚠ El comando falló (código de salida {code}).",
            ],
            Message::TweakWarnings => [
                "⚠ Tweak finished with warnings/errors.",
                "⚠ Tweak zakończył się z ostrzeżeniami/błędami.",
                "⚠ Твик завершился с предупреждениями/ошибками.",
                "⚠ Tweak mit Warnungen/Fehlern beendet.",
                "⚠ El ajuste terminó con advertencias/errores.",
            ],
            Message::NoScripts => [
                "No scripts found. Put your *.ps1 or *.cmd files into the 'scripts' folder.",
                "Brak skryptów. Wrzuć pliki *.ps1 lub *.cmd do folderu 'scripts'.",
                "Скрипты не найдены. Добавьте файлы *.ps1 или *.cmd в папку 'scripts'.",
                "Keine Skripte gefunden. Lege *.ps1 oder *.cmd in den Ordner 'scripts'.",
                "No se encontraron scripts. Coloca *.ps1 o *.cmd en la carpeta 'scripts'.",
            ],
            Message::RunningScript => [
                "▶ Running {name} ...",
                "▶ Uruchamianie {name} ...",
                "▶ Запуск {name} ...",
                "▶ {name} wird ausgeführt ...",
                "▶ Ejecutando {name} ...",
            ],
            Message::BackupStarted => [
                "Starting backup...",
                "Tworzenie kopii zapasowej...",
                "Создание резервной копии...",
                "Sicherung wird erstellt...",
                "Iniciando copia de seguridad...",
            ],
            Message::BackupSaved => [
                "✅ Backup saved: {path}",
                "✅ Kopia zapasowa zapisana: {path}",
                "✅ Резервная копия сохранена: {path}",
                "✅ Sicherung gespeichert: {path}",
                "✅ Copia de seguridad guardada: {path}",
            ],
            Message::BackupFailed => [
                "⚠ Backup failed: {reason}",
                "⚠ Kopia zapasowa nie powiodła się: {reason}",
                "⚠ Не удалось создать резервную копию: {reason}",
                "⚠ Sicherung fehlgeschlagen: {reason}",
                "⚠ La copia de seguridad falló: {reason}",
            ],
            Message::RunCancelled => [
                "⏹ Run cancelled, remaining items skipped.",
                "⏹ Przerwano, pozostałe pozycje pominięto.",
                "⏹ Запуск отменён, оставшиеся пункты пропущены.",
                "⏹ Abgebrochen, verbleibende Einträge übersprungen.",
                "⏹ Ejecución cancelada, se omitieron los elementos restantes.",
            ],
            Message::AllApplied => [
                "✨ All selected tweaks applied!",
                "✨ Wszystkie wybrane tweaki zastosowane!",
                "✨ Все выбранные твики применены!",
                "✨ Alle ausgewählten Tweaks angewendet!",
                "✨ ¡Todos los ajustes seleccionados aplicados!",
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_language_parses_native_names_and_codes() {
        assert_eq!(Language::from_str("Polski").unwrap(), Language::Polish);
        assert_eq!(Language::from_str("de").unwrap(), Language::German);
        assert_eq!(Language::from_str("english").unwrap(), Language::English);
        assert_eq!(Language::from_str("Русский").unwrap(), Language::Russian);
        assert!(Language::from_str("Klingon").is_err());
    }

    #[test]
    fn test_every_message_is_translated() {
        let all = [
            Message::DnsLabel,
            Message::PowerLabel,
            Message::DnsApplying,
            Message::PowerApplying,
            Message::DnsReportHeader,
            Message::DnsParseFailed,
            Message::Ipv6PolicyCaveat,
            Message::DnsAdaptersUpdated,
            Message::PowerFailed,
            Message::PowerUnverified,
            Message::SchemeGuidUnresolved,
            Message::ElevationDenied,
            Message::ElevationFailed,
            Message::CommandFailed,
            Message::TweakWarnings,
            Message::NoScripts,
            Message::RunningScript,
            Message::BackupStarted,
            Message::BackupSaved,
            Message::BackupFailed,
            Message::RunCancelled,
            Message::AllApplied,
        ];
        for message in all {
            for language in Language::iter() {
                assert!(
                    !message.text(language).is_empty(),
                    "{:?} missing for {}",
                    message,
                    language
                );
            }
        }
    }

    #[test]
    fn test_denied_and_failed_texts_differ() {
        for language in Language::iter() {
            assert_ne!(
                Message::ElevationDenied.text(language),
                Message::ElevationFailed.text(language)
            );
        }
    }
}
